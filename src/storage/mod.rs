//! Storage layer for Boostr - cross-restart state.
//!
//! Per-account perfect titles and the account-independent title facts are
//! kept as JSON id sets behind the [`KeyValueStore`] trait.

mod caches;
mod json_file;
mod memory;
mod traits;

pub use caches::{GlobalTitleFacts, PerfectTitles, PersistedTitleSet, load_perfect_titles};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use traits::{ANTI_CHEAT_TITLES_KEY, KeyValueStore, NON_ACHIEVEMENT_TITLES_KEY, perfect_titles_key};
