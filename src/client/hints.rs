//! Optional pre-filter telling which owned titles likely have achievements.
//!
//! The remote hint service is best effort. When it is missing or fails, the
//! auto-boost queue falls back to an embedded list of titles that never carry
//! achievements.

use async_trait::async_trait;
use std::collections::HashSet;

use super::types::TitleId;

/// Well-known titles without achievements: SDKs, redistributables,
/// dedicated servers and test apps.
pub const NO_ACHIEVEMENT_TITLES: &[TitleId] = &[
    90,     // Half-Life Dedicated Server
    205,    // Source Dedicated Server
    215,    // Source SDK
    218,    // Source SDK Base 2007
    310,    // Source 2007 Dedicated Server
    480,    // Spacewar
    740,    // Counter-Strike Global Offensive Dedicated Server
    4020,   // Garry's Mod Dedicated Server
    228980, // Steamworks Common Redistributables
    243730, // Source SDK Base 2013 Singleplayer
    243750, // Source SDK Base 2013 Multiplayer
];

/// Remote source of achievement hints.
#[async_trait]
pub trait EligibilityHints: Send + Sync {
    /// Subset of `owned` that likely has achievements, or `None` if unreachable.
    async fn likely_with_achievements(&self, owned: &[TitleId]) -> Option<HashSet<TitleId>>;
}

/// Hint source with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticHints {
    answer: Option<HashSet<TitleId>>,
}

impl StaticHints {
    /// Always answers with `ids` (intersected with the owned set).
    pub fn new(ids: impl IntoIterator<Item = TitleId>) -> Self {
        Self {
            answer: Some(ids.into_iter().collect()),
        }
    }

    /// Always unreachable.
    pub fn unreachable() -> Self {
        Self { answer: None }
    }
}

#[async_trait]
impl EligibilityHints for StaticHints {
    async fn likely_with_achievements(&self, owned: &[TitleId]) -> Option<HashSet<TitleId>> {
        self.answer
            .as_ref()
            .map(|ids| owned.iter().copied().filter(|id| ids.contains(id)).collect())
    }
}

/// The filter actually applied to owned titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintFilter {
    /// Keep only these titles.
    Remote(HashSet<TitleId>),
    /// Drop the embedded no-achievement titles.
    Fallback,
}

impl HintFilter {
    /// Ask `hints` about `owned`, falling back when there is no answer.
    pub async fn resolve(hints: Option<&dyn EligibilityHints>, owned: &[TitleId]) -> Self {
        let Some(hints) = hints else {
            return HintFilter::Fallback;
        };
        match hints.likely_with_achievements(owned).await {
            Some(ids) => HintFilter::Remote(ids),
            None => {
                log::warn!("Achievement hint service unavailable, using embedded title list");
                HintFilter::Fallback
            }
        }
    }

    /// Whether the title passes the pre-filter.
    pub fn admits(&self, id: TitleId) -> bool {
        match self {
            HintFilter::Remote(ids) => ids.contains(&id),
            HintFilter::Fallback => !NO_ACHIEVEMENT_TITLES.contains(&id),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, HintFilter::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remote_hints_filter() {
        let hints = StaticHints::new([10, 30]);
        let filter = HintFilter::resolve(Some(&hints), &[10, 20, 30]).await;
        assert_eq!(filter, HintFilter::Remote(HashSet::from([10, 30])));
        assert!(filter.admits(10));
        assert!(!filter.admits(20));
    }

    #[tokio::test]
    async fn test_unreachable_hints_fall_back() {
        let hints = StaticHints::unreachable();
        let filter = HintFilter::resolve(Some(&hints), &[480, 20]).await;
        assert!(filter.is_fallback());
        assert!(!filter.admits(480));
        assert!(filter.admits(20));
    }

    #[tokio::test]
    async fn test_missing_hints_fall_back() {
        let filter = HintFilter::resolve(None, &[228980]).await;
        assert!(filter.is_fallback());
        assert!(!filter.admits(228980));
    }
}
