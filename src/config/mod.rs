//! Configuration system for Boostr.
//!
//! Two layers:
//! 1. Global config (./boostr.yml or ~/.config/boostr/boostr.yml)
//! 2. Per-account boosting settings under `accounts:`
//!
//! Out-of-range values are clamped with a warning, never rejected.

pub use self::boost::{BoostConfig, MAX_BOOST_INTERVAL, MAX_CONCURRENT_TITLES};
pub use self::global::GlobalConfig;

mod boost;
mod global;

use eyre::Result;
use std::path::PathBuf;

/// Load configuration from the standard search paths.
pub fn load_config(explicit_path: Option<&PathBuf>) -> Result<GlobalConfig> {
    GlobalConfig::load(explicit_path)
}
