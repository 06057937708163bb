//! Persisted title sets.
//!
//! The in-memory set is authoritative the moment it is modified; saving is
//! fire-and-forget and a failed save is only logged.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::traits::{ANTI_CHEAT_TITLES_KEY, KeyValueStore, NON_ACHIEVEMENT_TITLES_KEY, perfect_titles_key};
use crate::client::TitleId;
use crate::error::Result;

/// A set of title ids mirrored to one storage key.
pub struct PersistedTitleSet {
    key: String,
    store: Arc<dyn KeyValueStore>,
    ids: RwLock<BTreeSet<TitleId>>,
    save_lock: Mutex<()>,
}

impl std::fmt::Debug for PersistedTitleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedTitleSet")
            .field("key", &self.key)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl PersistedTitleSet {
    /// Load the set stored under `key`. Unreadable data starts an empty set.
    pub fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let ids = match store.load(&key) {
            Ok(Some(bytes)) => match serde_json::from_slice::<BTreeSet<TitleId>>(&bytes) {
                Ok(ids) => ids,
                Err(e) => {
                    log::warn!("Ignoring corrupt cache {}: {}", key, e);
                    BTreeSet::new()
                }
            },
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                log::error!("Failed to load cache {}: {}", key, e);
                BTreeSet::new()
            }
        };
        log::debug!("Loaded {} ids from {}", ids.len(), key);
        Self {
            key,
            store,
            ids: RwLock::new(ids),
            save_lock: Mutex::new(()),
        }
    }

    pub fn contains(&self, id: TitleId) -> bool {
        self.ids.read().unwrap_or_else(PoisonError::into_inner).contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current ids.
    pub fn snapshot(&self) -> BTreeSet<TitleId> {
        self.ids.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Mutate the set, then persist it if `f` reports a change.
    ///
    /// Snapshot and save happen under one save lock, so the stored value
    /// always matches the latest change. Readers are not blocked while saving.
    pub fn modify<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut BTreeSet<TitleId>) -> bool,
    {
        let _saving = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = {
            let mut ids = self.ids.write().unwrap_or_else(PoisonError::into_inner);
            if !f(&mut ids) {
                return false;
            }
            ids.clone()
        };

        if let Err(e) = self.persist(&snapshot) {
            log::error!("Failed to persist {}: {}", self.key, e);
        }
        true
    }

    fn persist(&self, ids: &BTreeSet<TitleId>) -> Result<()> {
        let bytes = serde_json::to_vec(ids)?;
        self.store.save(&self.key, &bytes)
    }

    /// Add one id. Returns true if it was new.
    pub fn insert(&self, id: TitleId) -> bool {
        self.modify(|ids| ids.insert(id))
    }
}

/// Titles whose every achievement is unlocked, per account.
pub type PerfectTitles = PersistedTitleSet;

/// Load an account's perfect titles.
pub fn load_perfect_titles(store: Arc<dyn KeyValueStore>, account: &str) -> PerfectTitles {
    PersistedTitleSet::load(store, perfect_titles_key(account))
}

/// Account-independent facts about titles, shared by every account.
#[derive(Debug)]
pub struct GlobalTitleFacts {
    /// Titles without the achievement feature.
    pub non_achievement: PersistedTitleSet,
    /// Titles with anti-cheat enabled.
    pub anti_cheat: PersistedTitleSet,
}

impl GlobalTitleFacts {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            non_achievement: PersistedTitleSet::load(store.clone(), NON_ACHIEVEMENT_TITLES_KEY),
            anti_cheat: PersistedTitleSet::load(store, ANTI_CHEAT_TITLES_KEY),
        }
    }
}
