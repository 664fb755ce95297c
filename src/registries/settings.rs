use crate::contexts::{GeneratorOptions, UploadPolicy, ACCEPTED_EXTENSION, DEFAULT_CACHE_DIR, MAX_UPLOAD_BYTES};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file read when no path is given
pub const DEFAULT_SETTINGS_PATH: &str = "lexifill.yml";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
/// OpenAI-compatible endpoint of the Groq API
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_PARSER: &str = "python3 parser/parse_doc.py";

/// Errors while resolving settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    Read(String),
    Yaml(String),
    Invalid { key: String, value: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SettingsError::Read(details) => write!(f, "Failed to read settings: {}", details),
            SettingsError::Yaml(details) => write!(f, "Invalid settings YAML: {}", details),
            SettingsError::Invalid { key, value } => {
                write!(f, "Invalid value '{}' for setting '{}'", value, key)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// Resolved runtime settings.
///
/// Layers, later wins: built-in defaults, the YAML settings file, environment.
/// The API key is only read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    pub cache_dir: PathBuf,
    /// Program and leading arguments; the document path is appended
    pub parser_command: Vec<String>,
    pub max_upload_bytes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff: Duration::from_millis(500),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            parser_command: split_command(DEFAULT_PARSER),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl Settings {
    /// Loads settings from `path` (or `lexifill.yml` if present) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = Settings::default();

        let explicit = path.is_some();
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));

        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| SettingsError::Read(format!("{}: {}", path.display(), e)))?;
            settings.apply_yaml(&content)?;
        } else if explicit {
            return Err(SettingsError::Read(format!("{} does not exist", path.display())));
        }

        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn generator_options(&self, use_cache: bool) -> GeneratorOptions {
        GeneratorOptions {
            timeout: self.timeout,
            max_retries: self.max_retries,
            backoff: self.backoff,
            cache_dir: Some(self.cache_dir.clone()),
            use_cache,
        }
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_bytes: self.max_upload_bytes,
            extension: ACCEPTED_EXTENSION.to_string(),
        }
    }

    fn apply_yaml(&mut self, yaml_content: &str) -> Result<(), SettingsError> {
        use yaml_rust::YamlLoader;

        let docs = YamlLoader::load_from_str(yaml_content)
            .map_err(|e| SettingsError::Yaml(e.to_string()))?;
        let Some(doc) = docs.first() else {
            return Ok(());
        };
        if doc.as_hash().is_none() {
            return Err(SettingsError::Yaml("expected a mapping at the top level".to_string()));
        }

        if let Some(model) = doc["model"].as_str() {
            self.model = model.to_string();
        }
        if let Some(base_url) = doc["base_url"].as_str() {
            self.base_url = base_url.to_string();
        }
        if let Some(cache_dir) = doc["cache_dir"].as_str() {
            self.cache_dir = PathBuf::from(cache_dir);
        }
        if let Some(parser) = doc["parser"].as_str() {
            self.parser_command = split_command(parser);
        }
        if let Some(secs) = yaml_number(doc, "timeout_secs")? {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = yaml_number(doc, "max_retries")? {
            self.max_retries = u32::try_from(retries).map_err(|_| invalid("max_retries", retries))?;
        }
        if let Some(ms) = yaml_number(doc, "backoff_ms")? {
            self.backoff = Duration::from_millis(ms);
        }
        if let Some(mb) = yaml_number(doc, "max_upload_mb")? {
            self.max_upload_bytes = mb.saturating_mul(1024 * 1024);
        }

        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GROQ_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = get("GROQ_MODEL") {
            self.model = model;
        }
        if let Some(base_url) = get("LEXIFILL_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(parser) = get("LEXIFILL_PARSER") {
            self.parser_command = split_command(&parser);
        }
        if let Some(secs) = get("LEXIFILL_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| invalid("LEXIFILL_TIMEOUT_SECS", secs))?;
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = get("LEXIFILL_MAX_RETRIES") {
            self.max_retries = retries
                .trim()
                .parse()
                .map_err(|_| invalid("LEXIFILL_MAX_RETRIES", retries))?;
        }

        Ok(())
    }
}

fn yaml_number(doc: &yaml_rust::Yaml, key: &str) -> Result<Option<u64>, SettingsError> {
    let value = &doc[key];
    if value.is_badvalue() || value.is_null() {
        return Ok(None);
    }
    value
        .as_i64()
        .and_then(|n| u64::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| invalid(key, format!("{:?}", value)))
}

fn invalid(key: &str, value: impl ToString) -> SettingsError {
    SettingsError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}
