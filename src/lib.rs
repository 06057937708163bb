//! Boostr - paced achievement boosting for owned titles.
//!
//! Each account gets a heartbeat loop that picks a few eligible titles,
//! unlocks at most one achievement per title per heartbeat, and keeps them
//! presented as "played" while they boost.

pub mod boost;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod storage;
pub mod time;

pub use error::{BoostError, Result};
