//! Paced session wrapper.
//!
//! The achievement service throttles aggressively, so every request goes
//! through [`RateLimitedClient`], which keeps a fixed gap between calls,
//! retries lookups a bounded number of times and turns an unusable session
//! into [`BoostError::Disconnected`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::session::SharedSession;
use super::types::{ActivityOutcome, Classification, CompletionRates, StatData, TitleId, TitleStats};
use crate::config::BoostConfig;
use crate::error::{BoostError, Result};

/// Request pacing bookkeeping for one session.
#[derive(Debug, Default)]
pub struct PacingState {
    /// When the last request was issued.
    pub last_request: Option<Instant>,
    /// Number of consecutive failed lookups.
    pub consecutive_failures: u32,
    /// Last successful lookup time.
    pub last_success: Option<Instant>,
}

impl PacingState {
    /// Create a new pacing state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Earliest instant the next request may be issued.
    pub fn next_allowed(&self, delay: Duration) -> Option<Instant> {
        self.last_request.map(|t| t + delay)
    }

    /// Record a failed lookup.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    /// Record a successful lookup, clearing the failure streak.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_success = Some(Instant::now());
    }
}

/// Session wrapper that paces and retries requests.
pub struct RateLimitedClient {
    session: SharedSession,
    request_delay: Duration,
    retries: u32,
    state: Mutex<PacingState>,
}

impl RateLimitedClient {
    /// Wrap a session using the account's pacing settings.
    pub fn new(session: SharedSession, config: &BoostConfig) -> Self {
        Self::with_pacing(session, config.request_delay(), config.lookup_retries)
    }

    /// Wrap a session with explicit pacing.
    pub fn with_pacing(session: SharedSession, request_delay: Duration, retries: u32) -> Self {
        Self {
            session,
            request_delay,
            retries: retries.max(1),
            state: Mutex::new(PacingState::new()),
        }
    }

    /// The wrapped session.
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Account name of the wrapped session.
    pub fn account(&self) -> &str {
        self.session.account()
    }

    /// Number of consecutive failed lookups.
    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).consecutive_failures
    }

    /// Fail fast when the session cannot issue requests.
    pub fn ensure_usable(&self) -> Result<()> {
        if self.session.is_session_usable() {
            Ok(())
        } else {
            Err(BoostError::Disconnected)
        }
    }

    /// Wait out the request gap. Cancellable.
    async fn pace(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(BoostError::Canceled);
        }

        let deadline = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_allowed(self.request_delay);

        if let Some(deadline) = deadline.filter(|d| *d > Instant::now()) {
            tokio::select! {
                _ = cancel.cancelled() => return Err(BoostError::Canceled),
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }

        self.state.lock().unwrap_or_else(PoisonError::into_inner).last_request = Some(Instant::now());
        Ok(())
    }

    /// Run one request, racing it against cancellation.
    async fn request<T, Fut>(&self, cancel: &CancellationToken, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = T>,
    {
        self.ensure_usable()?;
        self.pace(cancel).await?;
        tokio::select! {
            _ = cancel.cancelled() => Err(BoostError::Canceled),
            value = fut => Ok(value),
        }
    }

    /// Retry a lookup up to the configured number of tries.
    async fn lookup<T, F, Fut>(&self, id: TitleId, what: &str, cancel: &CancellationToken, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for attempt in 1..=self.retries {
            match self.request(cancel, call()).await? {
                Some(value) => {
                    self.state.lock().unwrap_or_else(PoisonError::into_inner).record_success();
                    return Ok(value);
                }
                None => {
                    self.state.lock().unwrap_or_else(PoisonError::into_inner).record_failure();
                    tracing::debug!(account = self.account(), title = id, attempt, what, "Lookup returned nothing");
                }
            }
        }

        // A failed reply caused by a dropped session is not a lookup failure
        self.ensure_usable()?;
        Err(BoostError::LookupFailed(
            id,
            format!("{} unavailable after {} tries", what, self.retries),
        ))
    }

    /// Fetch the store classification of a title.
    pub async fn title_classification(&self, id: TitleId, cancel: &CancellationToken) -> Result<Classification> {
        self.lookup(id, "classification", cancel, || self.session.title_classification(id))
            .await
    }

    /// Fetch global completion rates of a title.
    pub async fn completion_rates(&self, id: TitleId, cancel: &CancellationToken) -> Result<CompletionRates> {
        self.lookup(id, "completion rates", cancel, || self.session.completion_rates(id))
            .await
    }

    /// Fetch the current unlock state of a title. Never cached.
    pub async fn title_statistics(&self, id: TitleId, cancel: &CancellationToken) -> Result<TitleStats> {
        self.lookup(id, "statistics", cancel, || self.session.title_statistics(id))
            .await
    }

    /// Try to set one achievement. A single try; failures retry next heartbeat.
    pub async fn set_achievement(
        &self,
        id: TitleId,
        achievement: &StatData,
        crc_token: u32,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let ok = self
            .request(cancel, self.session.set_achievement(id, achievement, crc_token))
            .await?;
        if !ok {
            self.ensure_usable()?;
        }
        Ok(ok)
    }

    /// Fetch owned titles. `None` means "keep what you have".
    pub async fn owned_titles(&self, cancel: &CancellationToken) -> Result<Option<HashMap<TitleId, String>>> {
        let owned = self.request(cancel, self.session.owned_titles()).await?;
        Ok(owned.filter(|o| !o.is_empty()))
    }

    /// Set the account's presence to playing these titles.
    pub async fn play_titles(&self, ids: &[TitleId]) -> Result<ActivityOutcome> {
        self.ensure_usable()?;
        Ok(self.session.play_titles(ids).await)
    }

    /// Resume the activity that was interrupted by `play_titles`.
    pub async fn resume_previous_activity(&self) -> Result<ActivityOutcome> {
        self.ensure_usable()?;
        Ok(self.session.resume_previous_activity().await)
    }

    /// Titles the card farmer is currently running.
    pub fn farming_titles(&self) -> Vec<TitleId> {
        self.session.farming_titles()
    }

    /// The configured play-while-idle queue.
    pub fn idle_titles(&self) -> Vec<TitleId> {
        self.session.idle_titles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockAchievement, MockSessionClient, MockTitle};
    use std::sync::Arc;

    fn client(mock: Arc<MockSessionClient>, delay_ms: u64) -> RateLimitedClient {
        RateLimitedClient::with_pacing(mock, Duration::from_millis(delay_ms), 3)
    }

    fn title() -> MockTitle {
        MockTitle::game(30, "Thirty").with_achievements(vec![MockAchievement::new("a", 20.0)])
    }

    #[test]
    fn test_pacing_state_failures() {
        let mut state = PacingState::new();
        state.record_failure();
        state.record_failure();
        assert_eq!(state.consecutive_failures, 2);
        state.record_success();
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_success.is_some());
    }

    #[test]
    fn test_next_allowed_without_requests() {
        let state = PacingState::new();
        assert!(state.next_allowed(Duration::from_millis(500)).is_none());
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let mock = Arc::new(MockSessionClient::new("acc").with_title(title()));
        let client = client(mock, 1);
        let cancel = CancellationToken::new();
        let c = client.title_classification(30, &cancel).await.unwrap();
        assert_eq!(c.name, "Thirty");
        assert_eq!(client.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_lookup_exhausts_retries() {
        let mock = Arc::new(MockSessionClient::new("acc"));
        let client = client(mock.clone(), 1);
        let cancel = CancellationToken::new();
        let err = client.title_classification(99, &cancel).await.unwrap_err();
        assert!(matches!(err, BoostError::LookupFailed(99, _)));
        assert_eq!(mock.classification_calls(99), 3);
        assert_eq!(client.consecutive_failures(), 3);
    }

    #[tokio::test]
    async fn test_disconnected_does_not_consume_retries() {
        let mock = Arc::new(MockSessionClient::new("acc").with_title(title()));
        mock.set_usable(false);
        let client = client(mock.clone(), 1);
        let cancel = CancellationToken::new();
        let err = client.title_statistics(30, &cancel).await.unwrap_err();
        assert!(matches!(err, BoostError::Disconnected));
        assert_eq!(mock.statistics_calls(30), 0);
    }

    #[tokio::test]
    async fn test_canceled_before_request() {
        let mock = Arc::new(MockSessionClient::new("acc").with_title(title()));
        let client = client(mock.clone(), 1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.title_statistics(30, &cancel).await.unwrap_err();
        assert!(matches!(err, BoostError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_request_gap() {
        let mock = Arc::new(MockSessionClient::new("acc").with_title(title()));
        let client = Arc::new(client(mock, 60_000));
        let cancel = CancellationToken::new();

        client.title_statistics(30, &cancel).await.unwrap();

        let second = {
            let client = client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { client.title_statistics(30, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let err = second.await.unwrap().unwrap_err();
        assert!(matches!(err, BoostError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_spaced() {
        let mock = Arc::new(MockSessionClient::new("acc").with_title(title()));
        let client = client(mock, 500);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        client.title_statistics(30, &cancel).await.unwrap();
        client.title_statistics(30, &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_empty_owned_titles_means_no_change() {
        let mock = Arc::new(MockSessionClient::new("acc"));
        let client = client(mock, 1);
        let cancel = CancellationToken::new();
        assert!(client.owned_titles(&cancel).await.unwrap().is_none());
    }
}
