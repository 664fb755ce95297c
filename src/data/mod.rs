mod cache;
mod placeholder;
mod question;
mod template;

pub use cache::Cache;
pub use placeholder::{
    sentinel, Document, Extraction, ExtractionError, Placeholder, SENTINEL_CLOSE, SENTINEL_OPEN,
};
pub use question::{AlignmentError, Question, QuestionSet};
pub use template::Template;
