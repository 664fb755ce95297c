use crate::data::{Extraction, ExtractionError};
use std::fmt;
use std::fs;
use std::path::Path;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
/// The one accepted document format
pub const ACCEPTED_EXTENSION: &str = "docx";

/// Rejections of an upload before any extraction happens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NotFound(String),
    WrongFormat { file: String, expected: String },
    TooLarge { file: String, size: u64, limit: u64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationError::NotFound(file) => write!(f, "No file found at {}", file),
            ValidationError::WrongFormat { file, expected } => {
                write!(f, "{} is not a .{} file; only .{} files are allowed", file, expected, expected)
            }
            ValidationError::TooLarge { file, size, limit } => write!(
                f,
                "{} is {} bytes; the limit is {} bytes ({} MB)",
                file,
                size,
                limit,
                limit / (1024 * 1024)
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Size and format rules for uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub extension: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            extension: ACCEPTED_EXTENSION.to_string(),
        }
    }
}

impl UploadPolicy {
    pub fn check(&self, document: &Path) -> Result<(), ValidationError> {
        let file = document.display().to_string();

        let extension_ok = document
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        if !extension_ok {
            return Err(ValidationError::WrongFormat {
                file,
                expected: self.extension.clone(),
            });
        }

        let metadata = fs::metadata(document).map_err(|_| ValidationError::NotFound(file.clone()))?;
        if !metadata.is_file() {
            return Err(ValidationError::NotFound(file));
        }
        if metadata.len() > self.max_bytes {
            return Err(ValidationError::TooLarge {
                file,
                size: metadata.len(),
                limit: self.max_bytes,
            });
        }

        Ok(())
    }
}

/// Produces placeholders and a sentinel-bearing template from a native document
pub trait DocumentExtractor {
    fn extract(&self, document: &Path) -> Result<Extraction, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, bytes: usize) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("lexifill_upload_{}_{}", std::process::id(), name));
        fs::write(&path, vec![0u8; bytes]).unwrap();
        path
    }

    #[test]
    fn test_accepts_docx_within_limit() {
        let path = temp_file("ok.docx", 128);
        assert_eq!(UploadPolicy::default().check(&path), Ok(()));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let path = temp_file("UPPER.DOCX", 16);
        assert!(UploadPolicy::default().check(&path).is_ok());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rejects_other_formats() {
        let path = temp_file("contract.pdf", 16);
        assert!(matches!(
            UploadPolicy::default().check(&path),
            Err(ValidationError::WrongFormat { .. })
        ));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rejects_oversized() {
        let path = temp_file("big.docx", 2048);
        let policy = UploadPolicy {
            max_bytes: 1024,
            ..UploadPolicy::default()
        };
        assert!(matches!(
            policy.check(&path),
            Err(ValidationError::TooLarge { size: 2048, limit: 1024, .. })
        ));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rejects_missing_file() {
        let path = std::env::temp_dir().join("lexifill_definitely_missing.docx");
        assert!(matches!(
            UploadPolicy::default().check(&path),
            Err(ValidationError::NotFound(_))
        ));
    }
}
