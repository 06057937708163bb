//! Host session trait - every call the booster makes into the account session.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{ActivityOutcome, Classification, CompletionRates, StatData, TitleId, TitleStats};

/// One logged-in account session.
///
/// Implementations are thin RPC clients. `None` / `false` replies mean the
/// call failed; they never panic and never retry on their own.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Account name used in logs and storage keys.
    fn account(&self) -> &str;

    /// Whether the session can currently issue requests.
    fn is_session_usable(&self) -> bool;

    /// Owned titles (id -> name). `None` or empty means "no change".
    async fn owned_titles(&self) -> Option<HashMap<TitleId, String>>;

    /// Current unlock state of a title.
    async fn title_statistics(&self, id: TitleId) -> Option<TitleStats>;

    /// Flip one achievement (and its dependency, if any) to set.
    async fn set_achievement(&self, id: TitleId, achievement: &StatData, crc_token: u32) -> bool;

    /// Store classification of a title.
    async fn title_classification(&self, id: TitleId) -> Option<Classification>;

    /// Global completion rates of a title's achievements.
    async fn completion_rates(&self, id: TitleId) -> Option<CompletionRates>;

    /// Set the account's presence to playing these titles.
    async fn play_titles(&self, ids: &[TitleId]) -> ActivityOutcome;

    /// Restore whatever the account was doing before `play_titles`.
    async fn resume_previous_activity(&self) -> ActivityOutcome;

    /// Titles the card farmer is currently running (empty when not farming).
    fn farming_titles(&self) -> Vec<TitleId>;

    /// The configured play-while-idle queue.
    fn idle_titles(&self) -> Vec<TitleId>;
}

/// Shared handle to a session.
pub type SharedSession = Arc<dyn SessionClient>;
