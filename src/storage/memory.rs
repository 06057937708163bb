//! In-memory storage for tests and simulation.

use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::KeyValueStore;
use crate::error::{BoostError, Result};

/// Key-value store that never touches disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Vec<u8>>>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every save fails.
    pub fn failing() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            fail_saves: true,
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let values = self.values.read().map_err(|e| BoostError::Storage(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_saves {
            return Err(BoostError::Storage(format!("save of {} rejected", key)));
        }
        let mut values = self.values.write().map_err(|e| BoostError::Storage(e.to_string()))?;
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let store = MemoryStore::new();
        store.save("k", b"v").unwrap();
        assert_eq!(store.load("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_failing_store() {
        let store = MemoryStore::failing();
        assert!(matches!(store.save("k", b"v"), Err(BoostError::Storage(_))));
        assert!(store.load("k").unwrap().is_none());
    }
}
