//! Boost engine: per-title state, resting, unlock attempts and the modes.

mod engine;
mod modes;
mod resting;
mod state;
mod unlock;

pub use engine::{AchieveOrder, BoostContext, BoostEngine, BoostMode, EnginePhase, HeartbeatReport};
pub use modes::{AutoBoost, CardFarming, IdleGaming, ModeKind};
pub use resting::RestingRegistry;
pub use state::{MAX_UNLOCK_RETRIES, TitleBoostState};
pub use unlock::{UnlockOutcome, attempt_unlock, prioritize};
