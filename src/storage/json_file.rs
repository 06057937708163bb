//! File-backed storage with in-memory caching.
//!
//! Each key lives in its own `<key>.json` file under the base directory.
//! Files are the source of truth; the cache only saves re-reads.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use super::traits::KeyValueStore;
use crate::error::{BoostError, Result};

/// Distinguishes temp files of concurrent writers.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One-file-per-key storage.
pub struct JsonFileStore {
    base_path: PathBuf,
    cache: RwLock<HashMap<String, Vec<u8>>>,
}

impl std::fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

impl JsonFileStore {
    /// Create a new store rooted at the given directory.
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// File path for a key. Anything outside `[A-Za-z0-9_-]` becomes `_`.
    fn key_path(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", file))
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let cache = self.cache.read().map_err(|e| BoostError::Storage(e.to_string()))?;
            if let Some(value) = cache.get(key) {
                return Ok(Some(value.clone()));
            }
        }

        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read(&path)?;

        let mut cache = self.cache.write().map_err(|e| BoostError::Storage(e.to_string()))?;
        cache.insert(key.to_string(), value.clone());
        Ok(Some(value))
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        // Write to a temp file and rename so a crash never leaves half a file
        let path = self.key_path(key);
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}.{}.tmp", std::process::id(), n));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;

        let mut cache = self.cache.write().map_err(|e| BoostError::Storage(e.to_string()))?;
        cache.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_key() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path()).unwrap();
        assert!(store.load("nothing").unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path()).unwrap();
        store.save("perfect-titles-main", b"[10,20]").unwrap();
        assert_eq!(store.load("perfect-titles-main").unwrap(), Some(b"[10,20]".to_vec()));
    }

    #[test]
    fn test_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        {
            let store = JsonFileStore::new(temp.path()).unwrap();
            store.save("anti-cheat-titles", b"[730]").unwrap();
        }
        let store = JsonFileStore::new(temp.path()).unwrap();
        assert_eq!(store.load("anti-cheat-titles").unwrap(), Some(b"[730]".to_vec()));
    }

    #[test]
    fn test_key_is_sanitized() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path()).unwrap();
        store.save("../escape", b"[]").unwrap();
        assert!(temp.path().join("___escape.json").exists());
    }

    #[test]
    fn test_creates_base_dir() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        JsonFileStore::new(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_concurrent_saves_of_one_key() {
        let temp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(JsonFileStore::new(temp.path()).unwrap());

        let writers: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || store.save("anti-cheat-titles", format!("[{}]", n).as_bytes()))
            })
            .collect();
        for writer in writers {
            writer.join().unwrap().unwrap();
        }

        let files: Vec<_> = fs::read_dir(temp.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(files, vec![std::ffi::OsString::from("anti-cheat-titles.json")]);
    }
}
