use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use super::template::Template;

/// Opening marker of a sentinel token in an extracted template.
pub const SENTINEL_OPEN: &str = "<<";
/// Closing marker of a sentinel token in an extracted template.
pub const SENTINEL_CLOSE: &str = ">>";

/// Returns the sentinel token for a placeholder id, e.g. `<<party_name>>`.
pub fn sentinel(id: &str) -> String {
    format!("{}{}{}", SENTINEL_OPEN, id, SENTINEL_CLOSE)
}

/// A named fill-in point of a document template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub id: String,
    pub line_num: usize,
    /// Human readable name; doubles as the question when none was generated
    #[serde(default)]
    pub label: String,
}

impl Placeholder {
    pub fn new(id: impl Into<String>, line_num: usize, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            line_num,
            label: label.into(),
        }
    }
}

/// Errors reported while accepting an extractor result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The extractor ran but reported a failure; carries its diagnostic text
    Parser(String),
    /// The extractor output is not the expected JSON document
    Malformed(String),
    DuplicateId(String),
    MissingSentinel(String),
    /// The sentinel matcher could not be built for this placeholder set
    Pattern(String),
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExtractionError::Parser(details) => {
                write!(f, "Failed to parse document: {}", details)
            }
            ExtractionError::Malformed(details) => {
                write!(f, "Extractor output is not usable: {}", details)
            }
            ExtractionError::DuplicateId(id) => {
                write!(f, "Placeholder id '{}' occurs more than once", id)
            }
            ExtractionError::MissingSentinel(id) => {
                write!(f, "Placeholder '{}' has no {} token in the template", id, sentinel(id))
            }
            ExtractionError::Pattern(details) => {
                write!(f, "Could not build placeholder matcher: {}", details)
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

/// Raw result of the placeholder extractor, as emitted on its stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub placeholders: Vec<Placeholder>,
    #[serde(rename = "replacedTemplate")]
    pub replaced_template: String,
}

/// A validated extraction: placeholders in resolution order plus the compiled template
#[derive(Debug, Clone)]
pub struct Document {
    pub placeholders: Vec<Placeholder>,
    pub template: Template,
}

impl Extraction {
    /// Parses extractor output.
    ///
    /// The extractor reports its own failures as `{"error": "..."}`; those become
    /// `ExtractionError::Parser` with the reported text.
    pub fn from_json(content: &str) -> Result<Self, ExtractionError> {
        let value: serde_json::Value = serde_json::from_str(content.trim())
            .map_err(|e| ExtractionError::Malformed(format!("invalid JSON: {}", e)))?;

        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            let details = value
                .get("details")
                .and_then(|d| d.as_str())
                .map(|d| format!("{} ({})", error, d))
                .unwrap_or_else(|| error.to_string());
            return Err(ExtractionError::Parser(details));
        }

        serde_json::from_value(value).map_err(|e| ExtractionError::Malformed(e.to_string()))
    }

    /// Reads extractor output previously saved to a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, ExtractionError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ExtractionError::Malformed(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Checks the placeholder invariants and compiles the template.
    ///
    /// Placeholders are stably ordered by `line_num`, blank labels fall back to the
    /// id, and every id must be unique and present in the template at least once.
    pub fn validate(self) -> Result<Document, ExtractionError> {
        let Extraction {
            mut placeholders,
            replaced_template,
        } = self;

        placeholders.sort_by_key(|p| p.line_num);

        let mut seen = HashSet::new();
        for placeholder in &mut placeholders {
            if !seen.insert(placeholder.id.clone()) {
                return Err(ExtractionError::DuplicateId(placeholder.id.clone()));
            }
            if placeholder.label.trim().is_empty() {
                placeholder.label = placeholder.id.clone();
            }
        }

        // Counted through the compiled matcher: a sentinel claimed by a longer id
        // does not count for a shorter one.
        let template = Template::compile(replaced_template, &placeholders)?;
        if let Some(missing) = placeholders.iter().find(|p| template.occurrences(&p.id) == 0) {
            return Err(ExtractionError::MissingSentinel(missing.id.clone()));
        }
        Ok(Document {
            placeholders,
            template,
        })
    }
}
