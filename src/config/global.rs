//! Global configuration.
//!
//! Loaded from ./boostr.yml or ~/.config/boostr/boostr.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::boost::BoostConfig;
use crate::client::TitleId;

/// Global configuration for Boostr.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GlobalConfig {
    /// Directory for persisted caches (defaults to the local data dir).
    pub data_dir: Option<PathBuf>,

    /// Titles never boosted on any account.
    pub blacklist: HashSet<TitleId>,

    /// Per-account boosting settings, keyed by account name.
    pub accounts: BTreeMap<String, BoostConfig>,
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. boostr.yml in current directory
    /// 3. ~/.config/boostr/boostr.yml
    /// 4. Defaults
    ///
    /// Every account section is sanitized before returning.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::locate(config_path)?;
        config.sanitize();
        Ok(config)
    }

    fn locate(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from("boostr.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from boostr.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load boostr.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("boostr").join("boostr.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Clamp every account's settings into range.
    pub fn sanitize(&mut self) {
        for (name, account) in self.accounts.iter_mut() {
            log::debug!("Sanitizing config for account {}", name);
            account.sanitize();
        }
    }

    /// Directory holding the persisted caches.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("boostr")
        })
    }
}
