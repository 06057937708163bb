//! Error types for Boostr
//!
//! Centralized error handling using thiserror. Only [`BoostError::Disconnected`]
//! and [`BoostError::Canceled`] are meant to cross layer boundaries; everything
//! else is handled where a retry/skip decision can be made.

use std::sync::Arc;
use thiserror::Error;

use crate::client::TitleId;

/// All error types that can occur in Boostr
#[derive(Debug, Error)]
pub enum BoostError {
    /// Metadata, statistics or unlock lookup exhausted its retries
    #[error("Lookup failed for title {0}: {1}")]
    LookupFailed(TitleId, String),

    /// The account session is not usable (logged off, reconnecting)
    #[error("Session disconnected")]
    Disconnected,

    /// The current heartbeat was canceled (play blocked or stop requested)
    #[error("Canceled")]
    Canceled,

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BoostError {
    /// True for errors that must abort the whole heartbeat.
    pub fn is_abort(&self) -> bool {
        matches!(self, BoostError::Disconnected | BoostError::Canceled)
    }
}

/// Errors shared by a coalesced lookup reach every waiting caller.
impl From<Arc<BoostError>> for BoostError {
    fn from(shared: Arc<BoostError>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| match &*shared {
            BoostError::LookupFailed(id, reason) => BoostError::LookupFailed(*id, reason.clone()),
            BoostError::Disconnected => BoostError::Disconnected,
            BoostError::Canceled => BoostError::Canceled,
            BoostError::Storage(reason) => BoostError::Storage(reason.clone()),
            other => BoostError::Storage(other.to_string()),
        })
    }
}

/// Result type alias for Boostr operations
pub type Result<T> = std::result::Result<T, BoostError>;
