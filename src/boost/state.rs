//! Per-title boosting progress.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::client::{CompletionRates, ProductInfo, TitleId, TitleStats};

/// Consecutive failures on one achievement tolerated before the title is
/// sent to a long rest.
pub const MAX_UNLOCK_RETRIES: u32 = 3;

/// Mutable record of a title known to the engine.
#[derive(Debug, Clone)]
pub struct TitleBoostState {
    pub id: TitleId,
    pub product: Arc<ProductInfo>,
    pub completion_rates: Arc<CompletionRates>,
    pub remaining_count: usize,
    pub unlockable_count: usize,
    /// Minutes boosted since the last rest.
    pub boosting_duration_minutes: u32,
    /// Consecutive failures on `last_failed_achievement`.
    pub failed_unlock_count: u32,
    pub last_failed_achievement: Option<String>,
    pub resting_until: Option<DateTime<Utc>>,
}

impl TitleBoostState {
    /// Create the state of a freshly selected title.
    pub fn new(product: Arc<ProductInfo>, completion_rates: Arc<CompletionRates>, stats: &TitleStats) -> Self {
        Self {
            id: product.id,
            product,
            completion_rates,
            remaining_count: stats.remaining_count(),
            unlockable_count: stats.unlockable_count(),
            boosting_duration_minutes: 0,
            failed_unlock_count: 0,
            last_failed_achievement: None,
            resting_until: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.product.name
    }

    /// Refresh the counters from a statistics reply.
    pub fn record_stats(&mut self, stats: &TitleStats) {
        self.remaining_count = stats.remaining_count();
        self.unlockable_count = stats.unlockable_count();
    }

    /// An achievement was set.
    pub fn record_unlock(&mut self) {
        self.remaining_count = self.remaining_count.saturating_sub(1);
        self.unlockable_count = self.unlockable_count.saturating_sub(1);
        self.failed_unlock_count = 0;
        self.last_failed_achievement = None;
    }

    /// Setting `api_name` failed. Returns the new consecutive failure count.
    pub fn record_failure(&mut self, api_name: &str) -> u32 {
        if self.last_failed_achievement.as_deref() == Some(api_name) {
            self.failed_unlock_count += 1;
        } else {
            self.last_failed_achievement = Some(api_name.to_string());
            self.failed_unlock_count = 1;
        }
        self.failed_unlock_count
    }

    /// Start counting failures afresh.
    pub fn clear_failures(&mut self) {
        self.failed_unlock_count = 0;
        self.last_failed_achievement = None;
    }

    /// The same achievement failed more often than tolerated.
    pub fn is_stuck(&self) -> bool {
        self.failed_unlock_count > MAX_UNLOCK_RETRIES
    }

    pub fn add_boosting_minutes(&mut self, minutes: u32) {
        self.boosting_duration_minutes = self.boosting_duration_minutes.saturating_add(minutes);
    }

    /// Whether the per-title boost duration cap is reached. Zero means no cap.
    pub fn exceeds_duration(&self, cap_minutes: u32) -> bool {
        cap_minutes > 0 && self.boosting_duration_minutes >= cap_minutes
    }
}

impl std::fmt::Display for TitleBoostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.product.name)
    }
}
