//! Eligibility filter - decides which owned titles may be boosted.
//!
//! Checks run cheapest first and never touch the network. Facts learned
//! during the session (perfect titles, anti-cheat, DLC...) make later calls
//! return false; eligibility is never cached by callers.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::client::{ProductInfo, TitleId};
use crate::config::BoostConfig;
use crate::storage::{GlobalTitleFacts, PerfectTitles};

/// Why a title was ruled out after its classification was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restriction {
    NoAchievements,
    AntiCheat,
    NotAGame,
    HasDlc,
    Developer,
    Publisher,
}

impl std::fmt::Display for Restriction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Restriction::NoAchievements => "no achievements",
            Restriction::AntiCheat => "anti-cheat enabled",
            Restriction::NotAGame => "not a released game",
            Restriction::HasDlc => "has DLC",
            Restriction::Developer => "restricted developer",
            Restriction::Publisher => "restricted publisher",
        };
        f.write_str(text)
    }
}

/// Per-account eligibility decisions.
pub struct EligibilityFilter {
    global_blacklist: Arc<HashSet<TitleId>>,
    config: Arc<BoostConfig>,
    facts: Arc<GlobalTitleFacts>,
    perfect: Arc<PerfectTitles>,
    non_boostable: RwLock<HashSet<TitleId>>,
}

impl EligibilityFilter {
    pub fn new(
        global_blacklist: Arc<HashSet<TitleId>>,
        config: Arc<BoostConfig>,
        facts: Arc<GlobalTitleFacts>,
        perfect: Arc<PerfectTitles>,
    ) -> Self {
        Self {
            global_blacklist,
            config,
            facts,
            perfect,
            non_boostable: RwLock::new(HashSet::new()),
        }
    }

    /// Cheap admissibility check from already known facts.
    pub fn is_eligible(&self, id: TitleId) -> bool {
        if self.global_blacklist.contains(&id) || self.config.blacklist.contains(&id) {
            return false;
        }

        if self.config.unrestricted_apps.contains(&id) {
            return true;
        }

        if self.facts.non_achievement.contains(id) {
            return false;
        }

        if self.config.restrict_app_with_vac && self.facts.anti_cheat.contains(id) {
            return false;
        }

        if self.perfect.contains(id) {
            return false;
        }

        !self
            .non_boostable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Check a freshly fetched classification against the restriction policy.
    ///
    /// DLC, developer, publisher and type violations are remembered for the
    /// rest of the session.
    pub fn check_product(&self, info: &ProductInfo) -> Result<(), Restriction> {
        if self.config.unrestricted_apps.contains(&info.id) {
            return Ok(());
        }

        if !info.has_achievements {
            return Err(Restriction::NoAchievements);
        }

        if self.config.restrict_app_with_vac && info.has_anti_cheat {
            return Err(Restriction::AntiCheat);
        }

        let violation = if !info.is_boostable_type() {
            Some(Restriction::NotAGame)
        } else if self.config.restrict_app_with_dlc && !info.dlc_ids.is_empty() {
            Some(Restriction::HasDlc)
        } else if !self.config.restrict_developers.is_disjoint(&info.developers) {
            Some(Restriction::Developer)
        } else if !self.config.restrict_publishers.is_disjoint(&info.publishers) {
            Some(Restriction::Publisher)
        } else {
            None
        };

        match violation {
            Some(restriction) => {
                self.mark_non_boostable(info.id);
                Err(restriction)
            }
            None => Ok(()),
        }
    }

    /// Exclude a title for the rest of this session.
    pub fn mark_non_boostable(&self, id: TitleId) {
        self.non_boostable
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
    }

    /// Record a title as perfect. Persisted; never eligible again.
    pub fn mark_perfect(&self, id: TitleId) -> bool {
        self.perfect.insert(id)
    }

    pub fn is_perfect(&self, id: TitleId) -> bool {
        self.perfect.contains(id)
    }

    pub fn perfect_count(&self) -> usize {
        self.perfect.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Classification, ReleaseState, TitleType};
    use crate::storage::{KeyValueStore, MemoryStore, load_perfect_titles};

    struct Fixture {
        facts: Arc<GlobalTitleFacts>,
        perfect: Arc<PerfectTitles>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        Fixture {
            facts: Arc::new(GlobalTitleFacts::load(store.clone())),
            perfect: Arc::new(load_perfect_titles(store, "acc")),
        }
    }

    fn filter(f: &Fixture, config: BoostConfig, global: &[TitleId]) -> EligibilityFilter {
        EligibilityFilter::new(
            Arc::new(global.iter().copied().collect()),
            Arc::new(config),
            f.facts.clone(),
            f.perfect.clone(),
        )
    }

    fn product(id: TitleId, categories: Vec<u32>) -> ProductInfo {
        ProductInfo::from_classification(
            id,
            Classification {
                name: format!("Title {}", id),
                title_type: TitleType::Game,
                release_state: ReleaseState::Released,
                dlc_ids: vec![],
                developers: vec!["Studio".to_string()],
                publishers: vec!["House".to_string()],
                categories,
            },
        )
    }

    #[test]
    fn test_unknown_title_is_eligible() {
        let f = fixture();
        assert!(filter(&f, BoostConfig::default(), &[]).is_eligible(1));
    }

    #[test]
    fn test_blacklists_reject() {
        let f = fixture();
        let config = BoostConfig {
            blacklist: HashSet::from([2]),
            ..Default::default()
        };
        let filter = filter(&f, config, &[1]);
        assert!(!filter.is_eligible(1));
        assert!(!filter.is_eligible(2));
    }

    #[test]
    fn test_blacklist_beats_unrestricted() {
        let f = fixture();
        let config = BoostConfig {
            blacklist: HashSet::from([5]),
            unrestricted_apps: HashSet::from([5, 6]),
            ..Default::default()
        };
        let filter = filter(&f, config, &[6]);
        assert!(!filter.is_eligible(5));
        assert!(!filter.is_eligible(6));
    }

    #[test]
    fn test_known_facts_reject() {
        let f = fixture();
        f.facts.non_achievement.insert(1);
        f.facts.anti_cheat.insert(2);
        f.perfect.insert(3);
        let filter = filter(&f, BoostConfig::default(), &[]);
        assert!(!filter.is_eligible(1));
        assert!(!filter.is_eligible(2));
        assert!(!filter.is_eligible(3));
    }

    #[test]
    fn test_anti_cheat_allowed_without_vac_restriction() {
        let f = fixture();
        f.facts.anti_cheat.insert(2);
        let config = BoostConfig {
            restrict_app_with_vac: false,
            ..Default::default()
        };
        assert!(filter(&f, config, &[]).is_eligible(2));
    }

    #[test]
    fn test_unrestricted_overrides_facts() {
        let f = fixture();
        f.facts.anti_cheat.insert(2);
        f.perfect.insert(2);
        let config = BoostConfig {
            unrestricted_apps: HashSet::from([2]),
            ..Default::default()
        };
        assert!(filter(&f, config, &[]).is_eligible(2));
    }

    #[test]
    fn test_check_product_dlc_marks_non_boostable() {
        let f = fixture();
        let config = BoostConfig {
            restrict_app_with_dlc: true,
            ..Default::default()
        };
        let filter = filter(&f, config, &[]);
        let mut info = product(9, vec![crate::client::CATEGORY_ACHIEVEMENTS]);
        info.dlc_ids.insert(10);

        assert!(filter.is_eligible(9));
        assert_eq!(filter.check_product(&info), Err(Restriction::HasDlc));
        assert!(!filter.is_eligible(9));
    }

    #[test]
    fn test_check_product_developer_and_publisher() {
        let f = fixture();
        let config = BoostConfig {
            restrict_developers: HashSet::from(["Studio".to_string()]),
            ..Default::default()
        };
        let info = product(9, vec![crate::client::CATEGORY_ACHIEVEMENTS]);
        assert_eq!(filter(&f, config, &[]).check_product(&info), Err(Restriction::Developer));

        let config = BoostConfig {
            restrict_publishers: HashSet::from(["House".to_string()]),
            ..Default::default()
        };
        let info = product(8, vec![crate::client::CATEGORY_ACHIEVEMENTS]);
        assert_eq!(filter(&f, config, &[]).check_product(&info), Err(Restriction::Publisher));
    }

    #[test]
    fn test_check_product_anti_cheat() {
        let f = fixture();
        let info = product(9, vec![crate::client::CATEGORY_ACHIEVEMENTS, crate::client::CATEGORY_ANTI_CHEAT]);
        assert_eq!(
            filter(&f, BoostConfig::default(), &[]).check_product(&info),
            Err(Restriction::AntiCheat)
        );
    }

    #[test]
    fn test_check_product_accepts_plain_game() {
        let f = fixture();
        let info = product(9, vec![crate::client::CATEGORY_ACHIEVEMENTS]);
        assert_eq!(filter(&f, BoostConfig::default(), &[]).check_product(&info), Ok(()));
    }

    #[test]
    fn test_eligibility_is_monotonic() {
        let f = fixture();
        let filter = filter(&f, BoostConfig::default(), &[]);
        assert!(filter.is_eligible(4));
        filter.mark_perfect(4);
        for _ in 0..3 {
            assert!(!filter.is_eligible(4));
        }
        filter.mark_non_boostable(5);
        assert!(!filter.is_eligible(5));
    }
}
