//! Scheduler module: per-account heartbeat loops.
//!
//! This module provides:
//! - **AccountBooster**: timer-driven heartbeat per account with Start/Stop/GetStatus.
//! - **BoostService**: shares the title catalog across accounts and owns the boosters.
//!
//! # Example
//!
//! ```ignore
//! use boostr::scheduler::BoostService;
//! use boostr::storage::JsonFileStore;
//!
//! let store = Arc::new(JsonFileStore::new(&data_dir)?);
//! let mut service = BoostService::new(store, config.blacklist.clone());
//! let booster = service.add_account(session, account_config);
//! println!("{}", booster.start(true));
//! ```

mod booster;
mod service;

pub use booster::{AccountBooster, BoosterStatus, HeartbeatOutcome};
pub use service::BoostService;
