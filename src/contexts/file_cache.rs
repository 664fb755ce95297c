use crate::data::Cache;
use std::fs;
use std::path::PathBuf;

/// Default root folder for cached service responses
pub const DEFAULT_CACHE_DIR: &str = ".lexifill";

/// FileCache stores raw question-generation responses on disk.
///
/// Layout: `{folder}/{instructions_model_hash}/{key}.cache`, where
/// `instructions_model_hash = sha256(prompt instructions + model name)`, so a new
/// model or new instructions never read stale entries.
#[derive(Debug, Clone)]
pub struct FileCache {
    folder: PathBuf,
    instructions_model_hash: String,
}

impl FileCache {
    pub fn new(folder: Option<PathBuf>, instructions_model_hash: String) -> Self {
        Self {
            folder: folder.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            instructions_model_hash,
        }
    }

    /// Keys are hex digests and therefore safe as file names
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir().join(format!("{}.cache", key))
    }

    fn cache_dir(&self) -> PathBuf {
        self.folder.join(&self.instructions_model_hash)
    }
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.cache_path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) {
        let dir = self.cache_dir();
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to create cache directory");
            return;
        }

        let path = self.cache_path(key);
        if let Err(e) = fs::write(&path, value) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_path_construction() {
        let cache = FileCache::new(Some(PathBuf::from("/tmp/cache")), "abc123".to_string());
        let path = cache.cache_path("test_key");
        assert_eq!(path, PathBuf::from("/tmp/cache/abc123/test_key.cache"));
    }

    #[test]
    fn test_cache_get_set() {
        let test_dir = std::env::temp_dir().join(format!("lexifill_cache_test_{}", std::process::id()));
        let cache = FileCache::new(Some(test_dir.clone()), "test_hash".to_string());

        assert_eq!(cache.get("nonexistent"), None);

        cache.set("test_key", "{\"questions\": []}");
        assert_eq!(cache.get("test_key"), Some("{\"questions\": []}".to_string()));

        cache.set("test_key", "new_value");
        assert_eq!(cache.get("test_key"), Some("new_value".to_string()));

        let _ = fs::remove_dir_all(&test_dir);
    }

    #[test]
    fn test_default_folder() {
        let cache = FileCache::new(None, "test_hash".to_string());
        assert_eq!(cache.folder, PathBuf::from(DEFAULT_CACHE_DIR));
    }
}
