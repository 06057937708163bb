//! Account Booster - the per-account heartbeat loop.
//!
//! Each heartbeat:
//! - bails out early when the session is unusable
//! - refreshes owned titles when the snapshot is stale
//! - picks the mode and swaps engines when it changed
//! - runs one engine heartbeat and re-arms the timer
//!
//! Heartbeats never overlap: a heartbeat that finds the previous one still
//! running is skipped and logged.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::boost::{BoostContext, BoostEngine, HeartbeatReport, ModeKind, RestingRegistry};
use crate::client::{EligibilityHints, TitleId};
use crate::error::{BoostError, Result};
use crate::time;

/// What a heartbeat did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// The engine ran a full cycle.
    Completed(HeartbeatReport),
    /// The previous heartbeat was still running.
    Skipped,
    /// Canceled by a play block or a stop request.
    Canceled,
    /// The session was not usable.
    Disconnected,
    /// Anything else; logged and retried at the normal interval.
    Failed(String),
}

/// Point-in-time view of an account, for status output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoosterStatus {
    pub account: String,
    pub running: bool,
    pub mode: Option<ModeKind>,
    pub active: Vec<TitleId>,
    pub resting: usize,
    pub perfect: usize,
    pub owned: usize,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub next_heartbeat: Option<DateTime<Utc>>,
}

impl std::fmt::Display for BoosterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] ", self.account)?;
        if !self.running {
            write!(f, "Stopped")?;
        } else {
            write!(f, "Running")?;
        }
        if let Some(mode) = self.mode {
            let ids: Vec<String> = self.active.iter().map(|id| id.to_string()).collect();
            write!(
                f,
                ", {} mode, boosting {} titles [{}], {} resting",
                mode,
                self.active.len(),
                ids.join(", "),
                self.resting
            )?;
        }
        write!(f, ", {} owned, {} perfect", self.owned, self.perfect)?;
        if self.running
            && let Some(next) = self.next_heartbeat
        {
            write!(f, ", next check at {}", next.format("%Y-%m-%d %H:%M UTC"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BoosterState {
    engine: Option<BoostEngine>,
    resting: RestingRegistry,
    owned: HashMap<TitleId, String>,
    owned_fetched_at: Option<DateTime<Utc>>,
}

impl BoosterState {
    fn owned_ids(&self) -> Vec<TitleId> {
        let mut ids: Vec<TitleId> = self.owned.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[derive(Debug, Default)]
struct Control {
    task: Option<JoinHandle<()>>,
    stop: Option<CancellationToken>,
    heartbeat: Option<CancellationToken>,
}

struct Inner {
    ctx: BoostContext,
    hints: Option<Arc<dyn EligibilityHints>>,
    state: tokio::sync::Mutex<BoosterState>,
    control: Mutex<Control>,
    status: RwLock<BoosterStatus>,
}

/// Drives boosting for one account.
#[derive(Clone)]
pub struct AccountBooster {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AccountBooster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountBooster")
            .field("account", &self.account())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl AccountBooster {
    pub fn new(ctx: BoostContext, hints: Option<Arc<dyn EligibilityHints>>) -> Self {
        let status = BoosterStatus {
            account: ctx.account().to_string(),
            perfect: ctx.eligibility.perfect_count(),
            ..Default::default()
        };
        Self {
            inner: Arc::new(Inner {
                ctx,
                hints,
                state: tokio::sync::Mutex::new(BoosterState::default()),
                control: Mutex::new(Control::default()),
                status: RwLock::new(status),
            }),
        }
    }

    pub fn account(&self) -> &str {
        self.inner.ctx.account()
    }

    pub fn context(&self) -> &BoostContext {
        &self.inner.ctx
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .task
            .is_some()
    }

    /// Start the heartbeat loop. Starting twice is not an error.
    pub fn start(&self, immediate: bool) -> String {
        let mut control = self.inner.control.lock().unwrap_or_else(PoisonError::into_inner);
        if control.task.is_some() {
            return format!("[{}] Boosting is already started", self.account());
        }

        let stop = CancellationToken::new();
        control.stop = Some(stop.clone());
        control.task = Some(tokio::spawn(run_loop(self.inner.clone(), stop, immediate)));
        drop(control);

        self.inner.update_status(|s| s.running = true);
        log::info!("[{}] Boosting started", self.account());
        format!("[{}] Boosting started", self.account())
    }

    /// Stop the loop and leave the current mode. Stopping twice is not an error.
    pub async fn stop(&self) -> String {
        let (task, stop) = {
            let mut control = self.inner.control.lock().unwrap_or_else(PoisonError::into_inner);
            (control.task.take(), control.stop.take())
        };
        let Some(task) = task else {
            return format!("[{}] Boosting is already stopped", self.account());
        };

        if let Some(stop) = stop {
            stop.cancel();
        }
        if let Err(e) = task.await {
            log::error!("[{}] Heartbeat task ended abnormally: {}", self.account(), e);
        }

        {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;
            if let Some(mut engine) = state.engine.take() {
                let kind = engine.kind();
                if let Err(e) = engine.leave(&self.inner.ctx, &mut state.resting, time::now()).await {
                    log::warn!("[{}] Failed to leave {} mode: {}", self.account(), kind, e);
                }
            }
            self.inner.refresh_status(state);
        }

        self.inner.update_status(|s| {
            s.running = false;
            s.next_heartbeat = None;
        });
        log::info!("[{}] Boosting stopped", self.account());
        format!("[{}] Boosting stopped", self.account())
    }

    /// Human-readable status line.
    pub fn status(&self) -> String {
        self.snapshot().to_string()
    }

    pub fn snapshot(&self) -> BoosterStatus {
        self.inner.status.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Run one heartbeat now.
    pub async fn heartbeat(&self) -> HeartbeatOutcome {
        self.inner.heartbeat().await
    }

    /// Playing was blocked by another client: cancel the running heartbeat.
    pub fn on_play_blocked(&self) {
        let control = self.inner.control.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = control.heartbeat.as_ref() {
            log::info!("[{}] Playing is blocked, canceling heartbeat", self.account());
            token.cancel();
        }
    }

    /// Ids currently resting.
    pub async fn resting_ids(&self) -> Vec<TitleId> {
        self.inner.state.lock().await.resting.ids()
    }
}

async fn run_loop(inner: Arc<Inner>, stop: CancellationToken, immediate: bool) {
    let config = &inner.ctx.config;
    let mut delay = if immediate {
        std::time::Duration::ZERO
    } else {
        std::time::Duration::from_secs(u64::from(time::jittered_minutes(config.min_boost_interval, config.max_boost_interval)) * 60)
    };

    loop {
        inner.update_status(|s| s.next_heartbeat = Some(time::now() + chrono::Duration::from_std(delay).unwrap_or_default()));
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let outcome = inner.heartbeat().await;
        if stop.is_cancelled() {
            break;
        }
        delay = inner.next_delay(&outcome);
    }

    log::debug!("[{}] Heartbeat loop exited", inner.ctx.account());
}

impl Inner {
    fn update_status<F: FnOnce(&mut BoosterStatus)>(&self, f: F) {
        f(&mut self.status.write().unwrap_or_else(PoisonError::into_inner));
    }

    fn refresh_status(&self, state: &BoosterState) {
        let perfect = self.ctx.eligibility.perfect_count();
        self.update_status(|s| {
            s.mode = state.engine.as_ref().map(BoostEngine::kind);
            s.active = state.engine.as_ref().map(BoostEngine::active_ids).unwrap_or_default();
            s.resting = state.resting.len();
            s.owned = state.owned.len();
            s.perfect = perfect;
        });
    }

    fn begin_heartbeat(&self) -> CancellationToken {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        let token = control
            .stop
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        control.heartbeat = Some(token.clone());
        token
    }

    fn end_heartbeat(&self) {
        self.control.lock().unwrap_or_else(PoisonError::into_inner).heartbeat = None;
    }

    /// How long to wait before the next heartbeat.
    fn next_delay(&self, outcome: &HeartbeatOutcome) -> std::time::Duration {
        let config = &self.ctx.config;
        match outcome {
            HeartbeatOutcome::Completed(report) => time::to_std(report.next_achieve_at - time::now()),
            HeartbeatOutcome::Disconnected => time::to_std(config.disconnected_recheck()),
            HeartbeatOutcome::Skipped | HeartbeatOutcome::Canceled | HeartbeatOutcome::Failed(_) => {
                std::time::Duration::from_secs(
                    u64::from(time::jittered_minutes(config.min_boost_interval, config.max_boost_interval)) * 60,
                )
            }
        }
    }

    async fn heartbeat(&self) -> HeartbeatOutcome {
        let account = self.ctx.account();
        let Ok(mut guard) = self.state.try_lock() else {
            log::warn!("[{}] Previous heartbeat still running, skipping", account);
            return HeartbeatOutcome::Skipped;
        };

        let cancel = self.begin_heartbeat();
        let now = time::now();
        let result = self.run_heartbeat(&mut guard, now, &cancel).await;
        self.end_heartbeat();

        let outcome = match result {
            Ok(report) => {
                let ids: Vec<String> = report.active.iter().map(|id| id.to_string()).collect();
                let minutes = (report.next_achieve_at - now).num_minutes();
                tracing::info!(
                    account,
                    mode = %report.mode,
                    active = report.active.len(),
                    "[{}] Boosting {} titles ({}): {}; next check in {} min",
                    account,
                    report.active.len(),
                    report.mode,
                    ids.join(", "),
                    minutes
                );
                HeartbeatOutcome::Completed(report)
            }
            Err(BoostError::Canceled) => {
                log::info!("[{}] Heartbeat canceled", account);
                HeartbeatOutcome::Canceled
            }
            Err(BoostError::Disconnected) => {
                log::info!(
                    "[{}] Session not usable, rechecking in {} min",
                    account,
                    self.ctx.config.disconnected_recheck_minutes
                );
                HeartbeatOutcome::Disconnected
            }
            Err(e) => {
                log::error!("[{}] Heartbeat failed: {}", account, e);
                HeartbeatOutcome::Failed(e.to_string())
            }
        };

        self.refresh_status(&guard);
        self.update_status(|s| s.last_heartbeat = Some(now));
        outcome
    }

    async fn run_heartbeat(
        &self,
        state: &mut BoosterState,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<HeartbeatReport> {
        self.ctx.client.ensure_usable()?;
        self.refresh_owned(state, now, cancel).await?;

        let desired = ModeKind::select(
            &self.ctx.client.farming_titles(),
            &self.ctx.client.idle_titles(),
            &self.ctx.config,
        );

        let mut engine = match state.engine.take() {
            Some(engine) if engine.kind() == desired => engine,
            previous => {
                if let Some(mut old) = previous {
                    log::info!("[{}] Switching from {} to {} mode", self.ctx.account(), old.kind(), desired);
                    if let Err(e) = old.leave(&self.ctx, &mut state.resting, now).await {
                        if e.is_abort() {
                            return Err(e);
                        }
                        log::warn!("[{}] Failed to leave {} mode: {}", self.ctx.account(), old.kind(), e);
                    }
                }
                let mut engine = BoostEngine::new(desired.create(self.hints.clone()));
                engine.enter(&self.ctx, &state.owned_ids()).await?;
                engine
            }
        };

        let rest_period = time::is_rest_period(now, self.ctx.config.rest_time_per_day);
        let result = engine
            .heartbeat(&self.ctx, &mut state.resting, now, rest_period, cancel)
            .await;
        state.engine = Some(engine);
        result
    }

    /// Refetch owned titles when the snapshot is stale.
    async fn refresh_owned(&self, state: &mut BoosterState, now: DateTime<Utc>, cancel: &CancellationToken) -> Result<()> {
        let refresh = self.ctx.config.ownership_refresh();
        if state.owned_fetched_at.is_some_and(|at| now - at < refresh) {
            return Ok(());
        }

        let Some(owned) = self.ctx.client.owned_titles(cancel).await? else {
            log::debug!("[{}] No owned titles reply, keeping {}", self.ctx.account(), state.owned.len());
            return Ok(());
        };
        state.owned_fetched_at = Some(now);

        let removed: HashSet<TitleId> = state
            .owned
            .keys()
            .filter(|id| !owned.contains_key(id))
            .copied()
            .collect();
        let added = owned.keys().filter(|id| !state.owned.contains_key(id)).count();
        state.owned = owned;
        if removed.is_empty() && added == 0 {
            return Ok(());
        }

        log::info!(
            "[{}] Owned titles changed: {} added, {} removed, {} total",
            self.ctx.account(),
            added,
            removed.len(),
            state.owned.len()
        );
        state.resting.remove_by_ids(&removed);
        let ids = state.owned_ids();
        if let Some(engine) = state.engine.as_mut() {
            engine.owned_changed(&self.ctx, &ids, &removed).await;
        }
        Ok(())
    }
}
