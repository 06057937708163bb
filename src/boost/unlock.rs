//! Single unlock attempt for one title.

use tokio_util::sync::CancellationToken;

use super::state::TitleBoostState;
use crate::client::{CompletionRates, RateLimitedClient, StatData};
use crate::error::Result;

/// What one attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The achievement was set.
    Unlocked(String),
    /// Nothing left to unlock.
    Perfect,
    /// Achievements remain, but all of them are restricted.
    Blocked,
    /// Setting the achievement failed; the title's failure counter moved.
    Failed(String),
    /// Statistics could not be fetched; retried next heartbeat.
    Unavailable,
}

impl UnlockOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UnlockOutcome::Unlocked(_) | UnlockOutcome::Perfect)
    }
}

/// Unlockable achievements, highest completion rate first.
///
/// Rates come from `rates`; unknown achievements weigh 0. Ties keep the
/// service's order.
pub fn prioritize(achievements: Vec<StatData>, rates: &CompletionRates) -> Vec<StatData> {
    let mut unlockable: Vec<StatData> = achievements
        .into_iter()
        .filter(StatData::is_unlockable)
        .map(|mut a| {
            a.completion_rate = rates.get(&a.api_name).copied().unwrap_or(0.0);
            a
        })
        .collect();
    unlockable.sort_by(|a, b| b.completion_rate.total_cmp(&a.completion_rate));
    unlockable
}

/// Try to unlock the next achievement of `state`.
///
/// Only errors for which [`is_abort`](crate::BoostError::is_abort) holds
/// are returned; everything else is folded into the outcome.
pub async fn attempt_unlock(
    client: &RateLimitedClient,
    state: &mut TitleBoostState,
    cancel: &CancellationToken,
) -> Result<UnlockOutcome> {
    let stats = match client.title_statistics(state.id, cancel).await {
        Ok(stats) => stats,
        Err(e) if e.is_abort() => return Err(e),
        Err(e) => {
            log::debug!("No statistics for {}: {}", state, e);
            return Ok(UnlockOutcome::Unavailable);
        }
    };
    state.record_stats(&stats);

    let crc_token = stats.crc_token;
    let Some(next) = prioritize(stats.achievements, &state.completion_rates).into_iter().next() else {
        return Ok(if state.remaining_count == 0 {
            UnlockOutcome::Perfect
        } else {
            UnlockOutcome::Blocked
        });
    };

    match client.set_achievement(state.id, &next, crc_token, cancel).await {
        Ok(true) => {
            state.record_unlock();
            log::info!(
                "[{}] Unlocked '{}' of {} ({:.1}%), {} left",
                client.account(),
                next.name,
                state,
                next.completion_rate,
                state.remaining_count
            );
            Ok(UnlockOutcome::Unlocked(next.api_name))
        }
        Ok(false) => {
            let failures = state.record_failure(&next.api_name);
            log::warn!(
                "[{}] Failed to unlock '{}' of {} ({} in a row)",
                client.account(),
                next.name,
                state,
                failures
            );
            Ok(UnlockOutcome::Failed(next.api_name))
        }
        Err(e) => Err(e),
    }
}
