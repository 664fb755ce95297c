mod assembler;
mod file_cache;
mod question_generator;
mod renderer;
mod resolution;
mod upload;
mod workspace;

pub use assembler::{assemble, DOWNLOAD_FILENAME};
pub use file_cache::{FileCache, DEFAULT_CACHE_DIR};
pub use question_generator::{
    build_prompt, parse_response, strip_code_fences, CompletionClient, CompletionError,
    GenerationError, GeneratorOptions, QuestionGenerator,
};
pub use renderer::{highlight, preview_text, render_preview, Highlight, BLANK_GLYPH};
pub use resolution::{
    Answer, HistoryEntry, Phase, ResolutionState, SkipSet, TransitionError, ValueMap,
};
pub use upload::{
    DocumentExtractor, UploadPolicy, ValidationError, ACCEPTED_EXTENSION, MAX_UPLOAD_BYTES,
};
pub use workspace::{
    Action, Completion, QuestionRequest, QuestionStatus, Session, SessionError, SessionToken,
    Workspace,
};
