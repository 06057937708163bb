//! The three boost modes.
//!
//! Modes only differ in where candidates come from, how the active set is
//! ordered for the achieve step, and what committing the active set does.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use super::engine::{AchieveOrder, BoostContext, BoostMode};
use crate::client::{EligibilityHints, HintFilter, TitleId};
use crate::config::BoostConfig;
use crate::error::Result;

/// Which mode an engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    CardFarming,
    IdleGaming,
    AutoBoost,
}

impl std::fmt::Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModeKind::CardFarming => "card-farming",
            ModeKind::IdleGaming => "idle-gaming",
            ModeKind::AutoBoost => "auto-boost",
        };
        f.write_str(name)
    }
}

impl ModeKind {
    /// Pick the mode from the host's current activity.
    ///
    /// Card farming wins over the idle queue, which wins over auto-boost.
    pub fn select(farming: &[TitleId], idle: &[TitleId], config: &BoostConfig) -> Self {
        if !farming.is_empty() {
            ModeKind::CardFarming
        } else if config.boost_hours_when_idle && !idle.is_empty() {
            ModeKind::IdleGaming
        } else {
            ModeKind::AutoBoost
        }
    }

    /// Instantiate the mode's hooks.
    pub fn create(self, hints: Option<Arc<dyn EligibilityHints>>) -> Box<dyn BoostMode> {
        match self {
            ModeKind::CardFarming => Box::new(CardFarming::new()),
            ModeKind::IdleGaming => Box::new(IdleGaming::new()),
            ModeKind::AutoBoost => Box::new(AutoBoost::new(hints)),
        }
    }
}

/// Pops up to `needed` ids from `queue`, dropping excluded ones.
fn pop_candidates(queue: &mut VecDeque<TitleId>, needed: usize, exclude: &HashSet<TitleId>) -> Vec<TitleId> {
    let mut ids = Vec::with_capacity(needed);
    while ids.len() < needed {
        let Some(id) = queue.pop_front() else {
            break;
        };
        if !exclude.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Boost alongside the card farmer, on the titles it is running.
#[derive(Debug, Default)]
pub struct CardFarming;

impl CardFarming {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BoostMode for CardFarming {
    fn kind(&self) -> ModeKind {
        ModeKind::CardFarming
    }

    fn accepts(&self, ctx: &BoostContext, id: TitleId) -> bool {
        ctx.client.farming_titles().contains(&id)
    }

    fn find_candidates(&mut self, ctx: &BoostContext, needed: usize, exclude: &HashSet<TitleId>) -> Vec<TitleId> {
        ctx.client
            .farming_titles()
            .into_iter()
            .filter(|id| !exclude.contains(id) && ctx.eligibility.is_eligible(*id))
            .take(needed)
            .collect()
    }

    fn order_for_achieve(&self, ctx: &BoostContext, active: &[TitleId]) -> AchieveOrder {
        let farming: HashSet<TitleId> = ctx.client.farming_titles().into_iter().collect();
        let (achieve, release) = active.iter().copied().partition(|id| farming.contains(id));
        AchieveOrder { achieve, release }
    }

    fn stuck_cooldown(&self, config: &BoostConfig) -> Duration {
        config.stuck_cooldown() * 2
    }
}

/// Boost the configured play-while-idle titles, each at most once.
#[derive(Debug, Default)]
pub struct IdleGaming {
    titles: HashSet<TitleId>,
    queue: VecDeque<TitleId>,
}

impl IdleGaming {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BoostMode for IdleGaming {
    fn kind(&self) -> ModeKind {
        ModeKind::IdleGaming
    }

    async fn on_enter(&mut self, ctx: &BoostContext, _owned: &[TitleId]) -> Result<()> {
        self.titles.clear();
        self.queue.clear();
        for id in ctx.client.idle_titles() {
            if self.titles.insert(id) {
                self.queue.push_back(id);
            }
        }
        log::debug!("[{}] {} idle titles queued", ctx.account(), self.queue.len());
        Ok(())
    }

    fn accepts(&self, _ctx: &BoostContext, id: TitleId) -> bool {
        self.titles.contains(&id)
    }

    fn find_candidates(&mut self, _ctx: &BoostContext, needed: usize, exclude: &HashSet<TitleId>) -> Vec<TitleId> {
        pop_candidates(&mut self.queue, needed, exclude)
    }

    fn requeue(&mut self, ids: Vec<TitleId>) {
        self.queue.extend(ids);
    }

    fn stuck_cooldown(&self, config: &BoostConfig) -> Duration {
        config.stuck_cooldown() * 2
    }
}

/// Boost any eligible owned title, playing the active set.
pub struct AutoBoost {
    hints: Option<Arc<dyn EligibilityHints>>,
    owned: HashSet<TitleId>,
    queue: VecDeque<TitleId>,
    playing: bool,
}

impl std::fmt::Debug for AutoBoost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoBoost")
            .field("owned", &self.owned.len())
            .field("queue", &self.queue)
            .field("playing", &self.playing)
            .finish_non_exhaustive()
    }
}

impl AutoBoost {
    pub fn new(hints: Option<Arc<dyn EligibilityHints>>) -> Self {
        Self {
            hints,
            owned: HashSet::new(),
            queue: VecDeque::new(),
            playing: false,
        }
    }

    /// Titles waiting to be tried, in order.
    pub fn queued(&self) -> Vec<TitleId> {
        self.queue.iter().copied().collect()
    }

    /// Hand presence back to whatever ran before boosting started.
    async fn stop_playing(&mut self, ctx: &BoostContext) -> Result<()> {
        if !self.playing {
            return Ok(());
        }
        self.playing = false;
        let outcome = ctx.client.resume_previous_activity().await?;
        if outcome.success {
            log::debug!("[{}] Nothing left to boost, resumed previous activity", ctx.account());
        } else {
            log::warn!("[{}] Could not resume previous activity: {}", ctx.account(), outcome.message);
        }
        Ok(())
    }

    async fn rebuild(&mut self, ctx: &BoostContext, owned: &[TitleId]) {
        let mut ids = owned.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let filter = HintFilter::resolve(self.hints.as_deref(), &ids).await;
        self.queue = ids
            .iter()
            .copied()
            .filter(|id| filter.admits(*id) && ctx.eligibility.is_eligible(*id))
            .collect();
        self.owned = ids.into_iter().collect();

        log::info!(
            "[{}] {} of {} owned titles queued for boosting{}",
            ctx.account(),
            self.queue.len(),
            self.owned.len(),
            if filter.is_fallback() { " (embedded hints)" } else { "" }
        );
    }
}

#[async_trait]
impl BoostMode for AutoBoost {
    fn kind(&self) -> ModeKind {
        ModeKind::AutoBoost
    }

    async fn on_enter(&mut self, ctx: &BoostContext, owned: &[TitleId]) -> Result<()> {
        self.rebuild(ctx, owned).await;
        Ok(())
    }

    async fn on_owned_changed(&mut self, ctx: &BoostContext, owned: &[TitleId]) {
        self.rebuild(ctx, owned).await;
    }

    fn accepts(&self, _ctx: &BoostContext, id: TitleId) -> bool {
        self.owned.contains(&id)
    }

    fn find_candidates(&mut self, _ctx: &BoostContext, needed: usize, exclude: &HashSet<TitleId>) -> Vec<TitleId> {
        pop_candidates(&mut self.queue, needed, exclude)
    }

    fn requeue(&mut self, ids: Vec<TitleId>) {
        self.queue.extend(ids.into_iter().filter(|id| self.owned.contains(id)));
    }

    async fn on_commit(&mut self, ctx: &BoostContext, active: &[TitleId]) -> Result<bool> {
        let outcome = ctx.client.play_titles(active).await?;
        if outcome.success {
            self.playing = true;
            log::debug!("[{}] Playing {:?}: {}", ctx.account(), active, outcome.message);
        } else {
            log::warn!("[{}] Could not play {:?}: {}", ctx.account(), active, outcome.message);
        }
        Ok(outcome.success)
    }

    async fn on_idle(&mut self, ctx: &BoostContext) -> Result<()> {
        self.stop_playing(ctx).await
    }

    async fn on_exit(&mut self, ctx: &BoostContext) -> Result<()> {
        self.stop_playing(ctx).await
    }
}
