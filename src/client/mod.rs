//! Client Layer - the boundary to the account session and achievement service
//!
//! This module provides:
//! - Wire-independent request/response types
//! - SessionClient trait for the host session
//! - RateLimitedClient for request pacing and bounded retries
//! - EligibilityHints for the optional remote pre-filter
//! - MockSessionClient for tests and simulation

pub mod hints;
pub mod mock;
pub mod rate_limited;
pub mod session;
pub mod types;

pub use hints::{EligibilityHints, HintFilter, NO_ACHIEVEMENT_TITLES, StaticHints};
pub use mock::{MockAchievement, MockFixture, MockSessionClient, MockTitle};
pub use rate_limited::{PacingState, RateLimitedClient};
pub use session::{SessionClient, SharedSession};
pub use types::{
    ActivityOutcome, CATEGORY_ACHIEVEMENTS, CATEGORY_ANTI_CHEAT, Classification, CompletionRates, ProductInfo,
    ReleaseState, StatData, StatDependency, TitleId, TitleStats, TitleType,
};
