//! Storage trait definitions.

use crate::error::Result;

/// Byte-oriented key-value persistence.
pub trait KeyValueStore: Send + Sync {
    /// Load the value for `key`, or `None` if it was never saved.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Storage key of an account's perfect titles.
pub fn perfect_titles_key(account: &str) -> String {
    format!("perfect-titles-{}", account)
}

/// Storage key of titles without the achievement feature.
pub const NON_ACHIEVEMENT_TITLES_KEY: &str = "non-achievement-titles";

/// Storage key of titles with anti-cheat enabled.
pub const ANTI_CHEAT_TITLES_KEY: &str = "anti-cheat-titles";
