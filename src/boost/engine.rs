//! Boost Engine - the per-heartbeat achieve/select/play cycle.
//!
//! One engine instance drives one mode. Each heartbeat:
//! 1. Achieve: one unlock attempt per active title, in mode order
//! 2. Stop here during the daily rest window
//! 3. Select: fill free slots from resting titles, then from the mode's source
//! 4. Play: run the mode's commit side effect for the active set
//! 5. Schedule the next achieve time with jitter
//!
//! Newly selected titles get their first unlock attempt right after
//! selection, before the commit.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::modes::ModeKind;
use super::resting::RestingRegistry;
use super::state::TitleBoostState;
use super::unlock::{UnlockOutcome, attempt_unlock};
use crate::catalog::{EligibilityFilter, TitleCatalog};
use crate::client::{RateLimitedClient, TitleId};
use crate::config::BoostConfig;
use crate::error::{BoostError, Result};
use crate::time;

/// Per-account collaborators shared by the engine and its mode.
#[derive(Clone)]
pub struct BoostContext {
    pub client: Arc<RateLimitedClient>,
    pub catalog: Arc<TitleCatalog>,
    pub eligibility: Arc<EligibilityFilter>,
    pub config: Arc<BoostConfig>,
}

impl BoostContext {
    pub fn account(&self) -> &str {
        self.client.account()
    }
}

/// Split of the active set for the achieve step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchieveOrder {
    /// Titles to attempt, in order.
    pub achieve: Vec<TitleId>,
    /// Titles to drop from the active set without resting.
    pub release: Vec<TitleId>,
}

/// Mode-specific hooks of the boost cycle.
#[async_trait]
pub trait BoostMode: Send + Sync {
    fn kind(&self) -> ModeKind;

    /// Called once when the engine starts in this mode.
    async fn on_enter(&mut self, _ctx: &BoostContext, _owned: &[TitleId]) -> Result<()> {
        Ok(())
    }

    /// The owned titles changed.
    async fn on_owned_changed(&mut self, _ctx: &BoostContext, _owned: &[TitleId]) {}

    /// Whether a title may be boosted in this mode at all.
    fn accepts(&self, ctx: &BoostContext, id: TitleId) -> bool;

    /// Up to `needed` new candidate ids, skipping `exclude`. Empty when the
    /// source is exhausted.
    fn find_candidates(&mut self, ctx: &BoostContext, needed: usize, exclude: &HashSet<TitleId>) -> Vec<TitleId>;

    /// Give back candidates whose lookup failed transiently.
    fn requeue(&mut self, _ids: Vec<TitleId>) {}

    /// Order the active titles for the achieve step.
    fn order_for_achieve(&self, _ctx: &BoostContext, active: &[TitleId]) -> AchieveOrder {
        AchieveOrder {
            achieve: active.to_vec(),
            release: Vec::new(),
        }
    }

    /// Commit the active set. `Ok(false)` means the commit was refused.
    async fn on_commit(&mut self, _ctx: &BoostContext, _active: &[TitleId]) -> Result<bool> {
        Ok(true)
    }

    /// The heartbeat ended with nothing active.
    async fn on_idle(&mut self, _ctx: &BoostContext) -> Result<()> {
        Ok(())
    }

    /// Called once when the engine leaves this mode.
    async fn on_exit(&mut self, _ctx: &BoostContext) -> Result<()> {
        Ok(())
    }

    /// Rest applied to a title stuck on one achievement.
    fn stuck_cooldown(&self, config: &BoostConfig) -> Duration {
        config.stuck_cooldown()
    }
}

/// Where the engine is within a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Achieving,
    Selecting,
    Playing,
}

/// Summary of one completed heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatReport {
    pub mode: ModeKind,
    pub active: Vec<TitleId>,
    pub next_achieve_at: DateTime<Utc>,
    pub rest_period: bool,
}

enum Disposition {
    Keep,
    Finish,
    Rest(Duration),
}

/// The boost cycle for one account in one mode.
pub struct BoostEngine {
    mode: Box<dyn BoostMode>,
    phase: EnginePhase,
    active: Vec<TitleBoostState>,
    last_heartbeat: Option<DateTime<Utc>>,
    next_achieve_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for BoostEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoostEngine")
            .field("mode", &self.mode.kind())
            .field("phase", &self.phase)
            .field("active", &self.active_ids())
            .finish()
    }
}

impl BoostEngine {
    /// Create an idle engine with an empty active set.
    pub fn new(mode: Box<dyn BoostMode>) -> Self {
        Self {
            mode,
            phase: EnginePhase::Idle,
            active: Vec::new(),
            last_heartbeat: None,
            next_achieve_at: None,
        }
    }

    pub fn kind(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn active(&self) -> &[TitleBoostState] {
        &self.active
    }

    pub fn active_ids(&self) -> Vec<TitleId> {
        self.active.iter().map(|s| s.id).collect()
    }

    pub fn is_active(&self, id: TitleId) -> bool {
        self.active.iter().any(|s| s.id == id)
    }

    pub fn next_achieve_at(&self) -> Option<DateTime<Utc>> {
        self.next_achieve_at
    }

    /// Enter the mode.
    pub async fn enter(&mut self, ctx: &BoostContext, owned: &[TitleId]) -> Result<()> {
        log::info!("[{}] Entering {} mode", ctx.account(), self.kind());
        self.mode.on_enter(ctx, owned).await
    }

    /// Leave the mode, parking every active title with an immediate expiry.
    pub async fn leave(&mut self, ctx: &BoostContext, resting: &mut RestingRegistry, now: DateTime<Utc>) -> Result<()> {
        for state in self.active.drain(..) {
            resting.mark_resting(state, now);
        }
        self.phase = EnginePhase::Idle;
        log::info!("[{}] Leaving {} mode", ctx.account(), self.kind());
        self.mode.on_exit(ctx).await
    }

    /// Drop titles that are no longer owned and tell the mode.
    pub async fn owned_changed(&mut self, ctx: &BoostContext, owned: &[TitleId], removed: &HashSet<TitleId>) {
        self.active.retain(|s| !removed.contains(&s.id));
        self.mode.on_owned_changed(ctx, owned).await;
    }

    /// Run one full heartbeat.
    ///
    /// Only abort errors are returned. Candidates collected before a
    /// cancellation are parked in `resting`.
    pub async fn heartbeat(
        &mut self,
        ctx: &BoostContext,
        resting: &mut RestingRegistry,
        now: DateTime<Utc>,
        rest_period: bool,
        cancel: &CancellationToken,
    ) -> Result<HeartbeatReport> {
        let elapsed = self.last_heartbeat.map_or(0, |last| time::elapsed_minutes(last, now));
        self.last_heartbeat = Some(now);

        let result = self.run_cycle(ctx, resting, now, elapsed, rest_period, cancel).await;
        self.phase = EnginePhase::Idle;
        result?;

        let next = time::jittered_deadline(now, ctx.config.min_boost_interval, ctx.config.max_boost_interval);
        self.next_achieve_at = Some(next);
        Ok(HeartbeatReport {
            mode: self.kind(),
            active: self.active_ids(),
            next_achieve_at: next,
            rest_period,
        })
    }

    async fn run_cycle(
        &mut self,
        ctx: &BoostContext,
        resting: &mut RestingRegistry,
        now: DateTime<Utc>,
        elapsed: u32,
        rest_period: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !self.active.is_empty() {
            self.phase = EnginePhase::Achieving;
            let order = self.mode.order_for_achieve(ctx, &self.active_ids());
            for id in &order.release {
                if let Some(pos) = self.position(*id) {
                    let state = self.active.remove(pos);
                    log::info!("[{}] {} left the {} set", ctx.account(), state, self.kind());
                }
            }
            self.achieve(ctx, resting, &order.achieve, elapsed, now, cancel).await?;
        }

        if rest_period {
            log::debug!("[{}] Daily rest period, not selecting titles", ctx.account());
            return self.release_if_idle(ctx).await;
        }

        let needed = ctx.config.max_concurrently_boosting_apps.saturating_sub(self.active.len());
        if needed > 0 {
            self.phase = EnginePhase::Selecting;
            let selected = self.select(ctx, resting, needed, now, cancel).await?;
            let new_ids: Vec<TitleId> = selected.iter().map(|s| s.id).collect();
            self.active.extend(selected);

            if !new_ids.is_empty() {
                self.phase = EnginePhase::Achieving;
                self.achieve(ctx, resting, &new_ids, 0, now, cancel).await?;
            }
        }

        if !self.active.is_empty() {
            self.phase = EnginePhase::Playing;
            let ids = self.active_ids();
            let committed = match self.mode.on_commit(ctx, &ids).await {
                Ok(committed) => committed,
                Err(e) if e.is_abort() => return Err(e),
                Err(e) => {
                    log::warn!("[{}] Commit failed: {}", ctx.account(), e);
                    false
                }
            };
            if !committed {
                let until = now + ctx.config.commit_failure_cooldown();
                for state in self.active.drain(..) {
                    resting.mark_resting(state, until);
                }
            }
        }

        self.release_if_idle(ctx).await
    }

    async fn release_if_idle(&mut self, ctx: &BoostContext) -> Result<()> {
        if !self.active.is_empty() {
            return Ok(());
        }
        match self.mode.on_idle(ctx).await {
            Err(e) if !e.is_abort() => {
                log::warn!("[{}] Failed to release idle {} mode: {}", ctx.account(), self.kind(), e);
                Ok(())
            }
            result => result,
        }
    }

    fn position(&self, id: TitleId) -> Option<usize> {
        self.active.iter().position(|s| s.id == id)
    }

    /// One unlock attempt for each of `ids` still active.
    async fn achieve(
        &mut self,
        ctx: &BoostContext,
        resting: &mut RestingRegistry,
        ids: &[TitleId],
        elapsed: u32,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let stuck_cooldown = self.mode.stuck_cooldown(&ctx.config);

        for &id in ids {
            if cancel.is_cancelled() {
                return Err(BoostError::Canceled);
            }
            let Some(pos) = self.position(id) else {
                continue;
            };

            let disposition = {
                let state = &mut self.active[pos];
                state.add_boosting_minutes(elapsed);
                let outcome = attempt_unlock(&ctx.client, state, cancel).await?;
                settle(ctx, state, &outcome, stuck_cooldown)
            };

            match disposition {
                Disposition::Keep => {}
                Disposition::Finish => {
                    self.active.remove(pos);
                }
                Disposition::Rest(cooldown) => {
                    let state = self.active.remove(pos);
                    resting.mark_resting(state, now + cooldown);
                }
            }
        }

        Ok(())
    }

    /// Collect up to `needed` new titles.
    async fn select(
        &mut self,
        ctx: &BoostContext,
        resting: &mut RestingRegistry,
        needed: usize,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TitleBoostState>> {
        let mode = &self.mode;
        let mut selected =
            resting.drain_ready_matching(now, needed, |id| mode.accepts(ctx, id) && ctx.eligibility.is_eligible(id));

        let mut exclude: HashSet<TitleId> = self.active.iter().map(|s| s.id).collect();
        exclude.extend(selected.iter().map(|s| s.id));
        exclude.extend(resting.ids());

        let mut deferred = Vec::new();
        while selected.len() < needed {
            let batch = self.mode.find_candidates(ctx, needed - selected.len(), &exclude);
            if batch.is_empty() {
                break;
            }

            let mut batch = batch.into_iter();
            while let Some(id) = batch.next() {
                if selected.len() >= needed {
                    deferred.push(id);
                    deferred.extend(batch.by_ref());
                    break;
                }
                exclude.insert(id);

                match prepare_candidate(ctx, id, cancel).await {
                    Ok(Some(state)) => {
                        log::info!("[{}] Selected {} ({} achievements left)", ctx.account(), state, state.remaining_count);
                        selected.push(state);
                    }
                    Ok(None) => {}
                    Err(e) if e.is_abort() => {
                        deferred.push(id);
                        deferred.extend(batch);
                        self.mode.requeue(deferred);
                        for state in selected {
                            resting.mark_resting(state, now);
                        }
                        return Err(e);
                    }
                    Err(e) => {
                        log::debug!("[{}] Deferring title {}: {}", ctx.account(), id, e);
                        deferred.push(id);
                    }
                }
            }
        }

        self.mode.requeue(deferred);
        Ok(selected)
    }
}

/// Decide what happens to a title after an unlock attempt.
fn settle(ctx: &BoostContext, state: &TitleBoostState, outcome: &UnlockOutcome, stuck_cooldown: Duration) -> Disposition {
    if *outcome != UnlockOutcome::Unavailable && state.unlockable_count == 0 {
        finish(ctx, state);
        return Disposition::Finish;
    }

    if state.is_stuck() {
        log::warn!(
            "[{}] {} is stuck on '{}', resting for {}h",
            ctx.account(),
            state,
            state.last_failed_achievement.as_deref().unwrap_or_default(),
            stuck_cooldown.num_hours()
        );
        return Disposition::Rest(stuck_cooldown);
    }

    if state.exceeds_duration(ctx.config.boost_duration_per_app) {
        log::info!(
            "[{}] {} boosted for {} min, resting",
            ctx.account(),
            state,
            state.boosting_duration_minutes
        );
        return Disposition::Rest(ctx.config.rest_time_per_app());
    }

    Disposition::Keep
}

/// A title with nothing left to unlock.
fn finish(ctx: &BoostContext, state: &TitleBoostState) {
    if state.remaining_count == 0 {
        ctx.eligibility.mark_perfect(state.id);
        log::info!("[{}] {} is perfect", ctx.account(), state);
    } else {
        ctx.eligibility.mark_non_boostable(state.id);
        log::info!(
            "[{}] Finished {}, {} achievements are restricted",
            ctx.account(),
            state,
            state.remaining_count
        );
    }
}

/// Resolve a candidate into a boost state, or `None` if it cannot be boosted.
async fn prepare_candidate(ctx: &BoostContext, id: TitleId, cancel: &CancellationToken) -> Result<Option<TitleBoostState>> {
    if !ctx.eligibility.is_eligible(id) {
        return Ok(None);
    }

    let product = ctx.catalog.product_info(&ctx.client, id, cancel).await?;
    if let Err(restriction) = ctx.eligibility.check_product(&product) {
        log::debug!("[{}] Skipping {} ({}): {}", ctx.account(), id, product.name, restriction);
        return Ok(None);
    }

    let rates = ctx.catalog.completion_rates(&ctx.client, id, cancel).await?;
    let stats = ctx.client.title_statistics(id, cancel).await?;
    let state = TitleBoostState::new(product, rates, &stats);

    if state.unlockable_count == 0 {
        finish(ctx, &state);
        return Ok(None);
    }
    Ok(Some(state))
}
