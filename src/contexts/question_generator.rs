use crate::contexts::FileCache;
use crate::data::{Cache, Placeholder, QuestionSet};
use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

/// Fixed instruction text of the question prompt; part of the cache folder hash
const PROMPT_INSTRUCTIONS: &str = "\
- Ensure that returned questions are in increasing line_num order.
- Return only valid JSON in the exact format:
{ \"questions\": [{ \"id\": \"...\", \"line_num\": ..., \"question\": \"...\" }, ...] }

Do not include any explanations, comments, or markdown formatting. Only return plain JSON.";

/// Errors raised by a text-generation service client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    MissingApiKey,
    Transport(String),
    Service { status: u16, body: String },
    EmptyResponse,
    Timeout(Duration),
}

impl CompletionError {
    /// Whether a repeat of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::MissingApiKey => false,
            CompletionError::Service { status, .. } => *status == 429 || *status >= 500,
            CompletionError::Transport(_)
            | CompletionError::EmptyResponse
            | CompletionError::Timeout(_) => true,
        }
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompletionError::MissingApiKey => write!(f, "no API key configured (set GROQ_API_KEY)"),
            CompletionError::Transport(details) => write!(f, "request failed: {}", details),
            CompletionError::Service { status, body } => {
                write!(f, "service returned {}: {}", status, body)
            }
            CompletionError::EmptyResponse => write!(f, "service returned no content"),
            CompletionError::Timeout(after) => {
                write!(f, "request timed out after {:.1}s", after.as_secs_f64())
            }
        }
    }
}

impl std::error::Error for CompletionError {}

/// Why questions could not be generated; both degrade to placeholder labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Transport or service failure, after retries
    Failure(String),
    /// The service answered, but not with the expected question JSON
    Malformed(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenerationError::Failure(details) => write!(f, "Question generation failed: {}", details),
            GenerationError::Malformed(details) => {
                write!(f, "Question response was malformed: {}", details)
            }
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<CompletionError> for GenerationError {
    fn from(e: CompletionError) -> Self {
        GenerationError::Failure(e.to_string())
    }
}

/// A text-generation service taking one prompt and answering with text
pub trait CompletionClient {
    /// Model name, used for cache partitioning and logs
    fn model_name(&self) -> &str;

    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, CompletionError>> + Send;
}

/// Request policy for question generation
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub backoff: Duration,
    pub cache_dir: Option<PathBuf>,
    pub use_cache: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff: Duration::from_millis(500),
            cache_dir: None,
            use_cache: true,
        }
    }
}

#[derive(Deserialize)]
struct QuestionEnvelope {
    questions: Vec<GeneratedQuestion>,
}

#[derive(Deserialize)]
struct GeneratedQuestion {
    id: String,
    #[serde(default)]
    question: String,
}

/// Turns a placeholder list into one question per placeholder
pub struct QuestionGenerator<C>
where
    C: CompletionClient,
{
    client: C,
    options: GeneratorOptions,
}

impl<C> QuestionGenerator<C>
where
    C: CompletionClient,
{
    pub fn new(client: C, options: GeneratorOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Generates questions aligned with `placeholders`.
    ///
    /// An empty list resolves to an empty set without contacting the service.
    /// Validated responses are cached; a cached response that no longer validates
    /// is ignored and fetched again.
    pub async fn generate(&self, placeholders: &[Placeholder]) -> Result<QuestionSet, GenerationError> {
        if placeholders.is_empty() {
            return Ok(QuestionSet::default());
        }

        let prompt = build_prompt(placeholders);
        let cache_key = sha256_hex(&prompt);
        let cache = self.cache();

        if let Some(cached) = cache.as_ref().and_then(|c| c.get(&cache_key)) {
            match parse_response(&cached, placeholders) {
                Ok(questions) => {
                    tracing::debug!(key = %cache_key, "using cached questions");
                    return Ok(questions);
                }
                Err(e) => tracing::warn!(key = %cache_key, error = %e, "ignoring unusable cache entry"),
            }
        }

        let body = self.complete_with_retry(&prompt).await?;
        let questions = parse_response(&body, placeholders)?;

        if let Some(cache) = cache {
            cache.set(&cache_key, &body);
        }

        tracing::info!(
            model = self.client.model_name(),
            count = questions.len(),
            "generated questions"
        );
        Ok(questions)
    }

    /// Sends the prompt, retrying retryable failures with exponential backoff
    async fn complete_with_retry(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = tokio::time::timeout(self.options.timeout, self.client.complete(prompt)).await;
            let error = match outcome {
                Ok(Ok(body)) => return Ok(body),
                Ok(Err(e)) => e,
                Err(_) => CompletionError::Timeout(self.options.timeout),
            };

            if !error.is_retryable() || attempt >= self.options.max_retries {
                tracing::warn!(attempt = attempt + 1, error = %error, "question generation gave up");
                return Err(error.into());
            }

            let delay = self.options.backoff.saturating_mul(2u32.saturating_pow(attempt));
            tracing::warn!(
                attempt = attempt + 1,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "question generation failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn cache(&self) -> Option<FileCache> {
        if !self.options.use_cache {
            return None;
        }
        let instructions_model_hash =
            sha256_hex(&format!("{}:{}", PROMPT_INSTRUCTIONS, self.client.model_name()));
        Some(FileCache::new(self.options.cache_dir.clone(), instructions_model_hash))
    }
}

/// Builds the question prompt; identical placeholder lists give identical prompts
pub fn build_prompt(placeholders: &[Placeholder]) -> String {
    let listing = placeholders
        .iter()
        .map(|p| format!("- {} (line_num: {})", p.id, p.line_num))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Given the following placeholder IDs and line numbers, generate a question for each \
         so a user can fill them in a legal document:\n\n{}\n\n{}",
        listing, PROMPT_INSTRUCTIONS
    )
}

/// Removes Markdown code-fence markers and surrounding whitespace
pub fn strip_code_fences(response: &str) -> String {
    fence_re().replace_all(response, "").trim().to_string()
}

/// Parses a service response into questions aligned with `placeholders`
pub fn parse_response(response: &str, placeholders: &[Placeholder]) -> Result<QuestionSet, GenerationError> {
    let cleaned = strip_code_fences(response);
    let envelope: QuestionEnvelope = serde_json::from_str(&cleaned)
        .map_err(|e| GenerationError::Malformed(format!("not question JSON: {}", e)))?;

    QuestionSet::align(
        placeholders,
        envelope.questions.into_iter().map(|q| (q.id, q.question)),
    )
    .map_err(|e| GenerationError::Malformed(e.to_string()))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)```(?:json)?\r?\n|```").expect("valid fence regex"))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
