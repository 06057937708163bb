//! In-memory session used by tests and the `simulate` command.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::session::SessionClient;
use super::types::{
    ActivityOutcome, CATEGORY_ACHIEVEMENTS, CATEGORY_ANTI_CHEAT, Classification, CompletionRates, ReleaseState,
    StatData, TitleId, TitleStats, TitleType,
};

fn default_true() -> bool {
    true
}

fn default_title_type() -> TitleType {
    TitleType::Game
}

/// One achievement of a [`MockTitle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockAchievement {
    pub api_name: String,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub set: bool,
    #[serde(default)]
    pub restricted: bool,
}

impl MockAchievement {
    pub fn new(api_name: &str, rate: f64) -> Self {
        Self {
            api_name: api_name.to_string(),
            rate,
            set: false,
            restricted: false,
        }
    }

    pub fn set(mut self) -> Self {
        self.set = true;
        self
    }

    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }
}

/// A title known to the mock session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTitle {
    pub id: TitleId,
    pub name: String,
    #[serde(default = "default_title_type")]
    pub title_type: TitleType,
    #[serde(default = "default_true")]
    pub released: bool,
    #[serde(default = "default_true")]
    pub has_achievements: bool,
    #[serde(default)]
    pub anti_cheat: bool,
    #[serde(default)]
    pub dlc_ids: Vec<TitleId>,
    #[serde(default)]
    pub developers: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub achievements: Vec<MockAchievement>,
}

impl MockTitle {
    /// A released game with the achievement feature and no achievements yet.
    pub fn game(id: TitleId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            title_type: TitleType::Game,
            released: true,
            has_achievements: true,
            anti_cheat: false,
            dlc_ids: Vec::new(),
            developers: Vec::new(),
            publishers: Vec::new(),
            achievements: Vec::new(),
        }
    }

    pub fn with_achievements(mut self, achievements: Vec<MockAchievement>) -> Self {
        self.achievements = achievements;
        self
    }

    pub fn with_anti_cheat(mut self) -> Self {
        self.anti_cheat = true;
        self
    }

    pub fn without_achievement_feature(mut self) -> Self {
        self.has_achievements = false;
        self
    }

    pub fn with_dlc(mut self, dlc_ids: Vec<TitleId>) -> Self {
        self.dlc_ids = dlc_ids;
        self
    }

    pub fn with_developer(mut self, developer: &str) -> Self {
        self.developers.push(developer.to_string());
        self
    }

    pub fn with_publisher(mut self, publisher: &str) -> Self {
        self.publishers.push(publisher.to_string());
        self
    }

    fn classification(&self) -> Classification {
        let mut categories = Vec::new();
        if self.has_achievements {
            categories.push(CATEGORY_ACHIEVEMENTS);
        }
        if self.anti_cheat {
            categories.push(CATEGORY_ANTI_CHEAT);
        }
        Classification {
            name: self.name.clone(),
            title_type: self.title_type,
            release_state: if self.released {
                ReleaseState::Released
            } else {
                ReleaseState::Prerelease
            },
            dlc_ids: self.dlc_ids.clone(),
            developers: self.developers.clone(),
            publishers: self.publishers.clone(),
            categories,
        }
    }

    fn stats(&self) -> TitleStats {
        let achievements = self
            .achievements
            .iter()
            .enumerate()
            .map(|(i, a)| StatData {
                stat_id: (i / 32) as u32 + 1,
                bit: (i % 32) as u8,
                is_set: a.set,
                restricted: a.restricted,
                dependency: None,
                name: a.api_name.clone(),
                api_name: a.api_name.clone(),
                completion_rate: 0.0,
            })
            .collect();
        TitleStats {
            achievements,
            crc_token: self.id,
        }
    }
}

/// Fixture file consumed by `boostr simulate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockFixture {
    pub account: String,
    pub farming: Vec<TitleId>,
    pub idle: Vec<TitleId>,
    pub titles: Vec<MockTitle>,
}

#[derive(Debug, Default)]
struct MockState {
    titles: BTreeMap<TitleId, MockTitle>,
    usable: bool,
    farming: Vec<TitleId>,
    idle: Vec<TitleId>,
    failing_unlocks: HashSet<TitleId>,
    play_fails: bool,
    played: Vec<Vec<TitleId>>,
    resume_calls: usize,
    classification_calls: HashMap<TitleId, usize>,
    rates_calls: HashMap<TitleId, usize>,
    statistics_calls: HashMap<TitleId, usize>,
    unlock_attempts: Vec<(TitleId, String)>,
}

/// Session backed entirely by memory.
#[derive(Debug)]
pub struct MockSessionClient {
    account: String,
    lookup_delay: Duration,
    state: Mutex<MockState>,
}

impl MockSessionClient {
    /// Create an empty, usable session.
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            lookup_delay: Duration::ZERO,
            state: Mutex::new(MockState {
                usable: true,
                ..Default::default()
            }),
        }
    }

    /// Build a session from a fixture.
    pub fn from_fixture(fixture: MockFixture) -> Self {
        let mock = Self::new(&fixture.account)
            .with_farming(fixture.farming)
            .with_idle(fixture.idle);
        fixture.titles.into_iter().fold(mock, |mock, title| mock.with_title(title))
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an owned title.
    pub fn with_title(self, title: MockTitle) -> Self {
        self.state().titles.insert(title.id, title);
        self
    }

    /// Delay classification and completion-rate replies.
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    pub fn with_farming(self, ids: Vec<TitleId>) -> Self {
        self.set_farming(ids);
        self
    }

    pub fn with_idle(self, ids: Vec<TitleId>) -> Self {
        self.state().idle = ids;
        self
    }

    pub fn set_farming(&self, ids: Vec<TitleId>) {
        self.state().farming = ids;
    }

    pub fn set_usable(&self, usable: bool) {
        self.state().usable = usable;
    }

    pub fn remove_title(&self, id: TitleId) {
        self.state().titles.remove(&id);
    }

    /// Make every unlock on this title fail.
    pub fn fail_unlocks(&self, id: TitleId) {
        self.state().failing_unlocks.insert(id);
    }

    pub fn set_play_fails(&self, fails: bool) {
        self.state().play_fails = fails;
    }

    /// Every `play_titles` call, in order.
    pub fn played(&self) -> Vec<Vec<TitleId>> {
        self.state().played.clone()
    }

    pub fn resume_calls(&self) -> usize {
        self.state().resume_calls
    }

    pub fn classification_calls(&self, id: TitleId) -> usize {
        self.state().classification_calls.get(&id).copied().unwrap_or(0)
    }

    pub fn rates_calls(&self, id: TitleId) -> usize {
        self.state().rates_calls.get(&id).copied().unwrap_or(0)
    }

    pub fn statistics_calls(&self, id: TitleId) -> usize {
        self.state().statistics_calls.get(&id).copied().unwrap_or(0)
    }

    /// Every `set_achievement` call as (title, api name), in order.
    pub fn unlock_attempts(&self) -> Vec<(TitleId, String)> {
        self.state().unlock_attempts.clone()
    }

    /// Achievements of a title that are currently set.
    pub fn unlocked(&self, id: TitleId) -> Vec<String> {
        self.state()
            .titles
            .get(&id)
            .map(|t| t.achievements.iter().filter(|a| a.set).map(|a| a.api_name.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionClient for MockSessionClient {
    fn account(&self) -> &str {
        &self.account
    }

    fn is_session_usable(&self) -> bool {
        self.state().usable
    }

    async fn owned_titles(&self) -> Option<HashMap<TitleId, String>> {
        let state = self.state();
        Some(state.titles.values().map(|t| (t.id, t.name.clone())).collect())
    }

    async fn title_statistics(&self, id: TitleId) -> Option<TitleStats> {
        let mut state = self.state();
        *state.statistics_calls.entry(id).or_insert(0) += 1;
        state.titles.get(&id).map(MockTitle::stats)
    }

    async fn set_achievement(&self, id: TitleId, achievement: &StatData, _crc_token: u32) -> bool {
        let mut state = self.state();
        state.unlock_attempts.push((id, achievement.api_name.clone()));
        if state.failing_unlocks.contains(&id) {
            return false;
        }
        let Some(title) = state.titles.get_mut(&id) else {
            return false;
        };
        match title.achievements.iter_mut().find(|a| a.api_name == achievement.api_name) {
            Some(a) if !a.restricted => {
                a.set = true;
                true
            }
            _ => false,
        }
    }

    async fn title_classification(&self, id: TitleId) -> Option<Classification> {
        *self.state().classification_calls.entry(id).or_insert(0) += 1;
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }
        self.state().titles.get(&id).map(MockTitle::classification)
    }

    async fn completion_rates(&self, id: TitleId) -> Option<CompletionRates> {
        *self.state().rates_calls.entry(id).or_insert(0) += 1;
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }
        self.state()
            .titles
            .get(&id)
            .map(|t| t.achievements.iter().map(|a| (a.api_name.clone(), a.rate)).collect())
    }

    async fn play_titles(&self, ids: &[TitleId]) -> ActivityOutcome {
        let mut state = self.state();
        if state.play_fails {
            return ActivityOutcome::failed("playing is blocked");
        }
        state.played.push(ids.to_vec());
        ActivityOutcome::ok(format!("playing {} titles", ids.len()))
    }

    async fn resume_previous_activity(&self) -> ActivityOutcome {
        self.state().resume_calls += 1;
        ActivityOutcome::ok("resumed")
    }

    fn farming_titles(&self) -> Vec<TitleId> {
        self.state().farming.clone()
    }

    fn idle_titles(&self) -> Vec<TitleId> {
        self.state().idle.clone()
    }
}
