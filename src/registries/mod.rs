mod completion_client;
mod document_parser;
mod settings;

pub use completion_client::{extract_content, ChatCompletionsClient};
pub use document_parser::CommandExtractor;
pub use settings::{
    Settings, SettingsError, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_PARSER, DEFAULT_SETTINGS_PATH,
};
