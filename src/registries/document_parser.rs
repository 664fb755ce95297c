use crate::contexts::DocumentExtractor;
use crate::data::{Extraction, ExtractionError};
use std::path::Path;
use std::process::{Command, Stdio};

/// Extracts placeholders by running an external parser on the document.
///
/// The parser gets the document path as its last argument and prints the
/// extraction JSON (`placeholders`, `replacedTemplate`) on stdout, or
/// `{"error": ...}` on failure.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new(command: &[String]) -> Result<Self, ExtractionError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ExtractionError::Parser("no parser command configured".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl DocumentExtractor for CommandExtractor {
    fn extract(&self, document: &Path) -> Result<Extraction, ExtractionError> {
        tracing::debug!(program = %self.program, document = %document.display(), "running document parser");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(document)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ExtractionError::Parser(format!("Failed to spawn parser '{}': {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            // Prefer the parser's own error report when it printed one
            if let Err(e @ ExtractionError::Parser(_)) = Extraction::from_json(&stdout) {
                return Err(e);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Parser(format!(
                "Parser exited with {}. Stdout: {} Stderr: {}",
                output.status,
                stdout.trim(),
                stderr.trim()
            )));
        }

        Extraction::from_json(&stdout)
    }
}
