//! Wire-independent types exchanged with the achievement service.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Stable identifier of a title (app id).
pub type TitleId = u32;

/// Store category flagging the achievement feature.
pub const CATEGORY_ACHIEVEMENTS: u32 = 22;

/// Store category flagging anti-cheat protection.
pub const CATEGORY_ANTI_CHEAT: u32 = 8;

/// Global completion percentage keyed by achievement API name.
pub type CompletionRates = HashMap<String, f64>;

/// Product type as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleType {
    Game,
    Application,
    Dlc,
    Demo,
    Tool,
    Other,
}

/// Release state as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseState {
    Released,
    Prerelease,
    Unavailable,
}

/// Raw classification reply for one title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub name: String,
    pub title_type: TitleType,
    pub release_state: ReleaseState,
    #[serde(default)]
    pub dlc_ids: Vec<TitleId>,
    #[serde(default)]
    pub developers: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub categories: Vec<u32>,
}

/// Immutable classification snapshot cached by the title catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInfo {
    pub id: TitleId,
    pub name: String,
    pub title_type: TitleType,
    pub released: bool,
    pub dlc_ids: HashSet<TitleId>,
    pub developers: HashSet<String>,
    pub publishers: HashSet<String>,
    pub has_achievements: bool,
    pub has_anti_cheat: bool,
}

impl ProductInfo {
    /// Build the snapshot from a classification reply.
    pub fn from_classification(id: TitleId, classification: Classification) -> Self {
        let has_achievements = classification.categories.contains(&CATEGORY_ACHIEVEMENTS);
        let has_anti_cheat = classification.categories.contains(&CATEGORY_ANTI_CHEAT);
        Self {
            id,
            name: classification.name,
            title_type: classification.title_type,
            released: classification.release_state == ReleaseState::Released,
            dlc_ids: classification.dlc_ids.into_iter().collect(),
            developers: classification.developers.into_iter().collect(),
            publishers: classification.publishers.into_iter().collect(),
            has_achievements,
            has_anti_cheat,
        }
    }

    /// Only released games can be boosted.
    pub fn is_boostable_type(&self) -> bool {
        self.title_type == TitleType::Game && self.released
    }
}

/// A stat another stat depends on; set together with the achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDependency {
    pub stat_id: u32,
    pub value: u32,
}

/// One achievement bit of a title, fetched fresh for every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatData {
    pub stat_id: u32,
    pub bit: u8,
    pub is_set: bool,
    /// Gated by a permission the account does not have.
    pub restricted: bool,
    pub dependency: Option<StatDependency>,
    pub name: String,
    pub api_name: String,
    /// Filled from the cached completion rates before sorting.
    #[serde(default)]
    pub completion_rate: f64,
}

impl StatData {
    /// Not yet set and not permission-gated.
    pub fn is_unlockable(&self) -> bool {
        !self.is_set && !self.restricted
    }
}

/// Current unlock state of a title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleStats {
    pub achievements: Vec<StatData>,
    pub crc_token: u32,
}

impl TitleStats {
    /// Achievements not yet set.
    pub fn remaining_count(&self) -> usize {
        self.achievements.iter().filter(|a| !a.is_set).count()
    }

    /// Achievements not yet set and not restricted.
    pub fn unlockable_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.is_unlockable()).count()
    }
}

/// Result of a presence call (play / resume).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityOutcome {
    pub success: bool,
    pub message: String,
}

impl ActivityOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
