//! Boost Service - wires shared caches and per-account boosters together.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::booster::AccountBooster;
use crate::boost::BoostContext;
use crate::catalog::{EligibilityFilter, TitleCatalog};
use crate::client::{EligibilityHints, RateLimitedClient, SharedSession, TitleId};
use crate::config::BoostConfig;
use crate::storage::{GlobalTitleFacts, KeyValueStore, load_perfect_titles};

/// All boosted accounts of one process.
///
/// The title catalog and the global title facts are shared by every account;
/// everything else belongs to exactly one [`AccountBooster`].
pub struct BoostService {
    store: Arc<dyn KeyValueStore>,
    catalog: Arc<TitleCatalog>,
    global_blacklist: Arc<HashSet<TitleId>>,
    hints: Option<Arc<dyn EligibilityHints>>,
    accounts: BTreeMap<String, AccountBooster>,
}

impl BoostService {
    pub fn new(store: Arc<dyn KeyValueStore>, global_blacklist: HashSet<TitleId>) -> Self {
        let facts = Arc::new(GlobalTitleFacts::load(store.clone()));
        Self {
            store,
            catalog: Arc::new(TitleCatalog::new(facts)),
            global_blacklist: Arc::new(global_blacklist),
            hints: None,
            accounts: BTreeMap::new(),
        }
    }

    /// Use a remote hint service for auto-boost candidate sourcing.
    pub fn with_hints(mut self, hints: Arc<dyn EligibilityHints>) -> Self {
        self.hints = Some(hints);
        self
    }

    pub fn catalog(&self) -> &Arc<TitleCatalog> {
        &self.catalog
    }

    /// Register an account. Re-registering replaces the previous booster.
    pub fn add_account(&mut self, session: SharedSession, config: BoostConfig) -> AccountBooster {
        let account = session.account().to_string();
        let config = Arc::new(config);
        let perfect = Arc::new(load_perfect_titles(self.store.clone(), &account));
        let eligibility = EligibilityFilter::new(
            self.global_blacklist.clone(),
            config.clone(),
            self.catalog.facts().clone(),
            perfect,
        );
        let ctx = BoostContext {
            client: Arc::new(RateLimitedClient::new(session, &config)),
            catalog: self.catalog.clone(),
            eligibility: Arc::new(eligibility),
            config,
        };

        let booster = AccountBooster::new(ctx, self.hints.clone());
        log::debug!("Registered account {}", account);
        self.accounts.insert(account, booster.clone());
        booster
    }

    pub fn account(&self, name: &str) -> Option<&AccountBooster> {
        self.accounts.get(name)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountBooster> {
        self.accounts.values()
    }

    pub fn start_all(&self, immediate: bool) -> Vec<String> {
        self.accounts.values().map(|b| b.start(immediate)).collect()
    }

    pub async fn stop_all(&self) -> Vec<String> {
        futures::future::join_all(self.accounts.values().map(|b| b.stop())).await
    }

    /// One status line per account.
    pub fn status(&self) -> String {
        self.accounts
            .values()
            .map(AccountBooster::status)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockAchievement, MockSessionClient, MockTitle};
    use crate::scheduler::HeartbeatOutcome;
    use crate::storage::MemoryStore;

    fn session(account: &str) -> (Arc<MockSessionClient>, SharedSession) {
        let mock = Arc::new(
            MockSessionClient::new(account).with_title(
                MockTitle::game(30, "Thirty")
                    .with_achievements(vec![MockAchievement::new("a", 1.0), MockAchievement::new("b", 2.0)]),
            ),
        );
        let session: SharedSession = mock.clone();
        (mock, session)
    }

    fn fast_config() -> BoostConfig {
        BoostConfig {
            request_delay_ms: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_catalog_shared_between_accounts() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut service = BoostService::new(store, HashSet::new());
        let (first_mock, first) = session("first");
        let (second_mock, second) = session("second");
        let a = service.add_account(first, fast_config());
        let b = service.add_account(second, fast_config());

        assert!(matches!(a.heartbeat().await, HeartbeatOutcome::Completed(_)));
        assert!(matches!(b.heartbeat().await, HeartbeatOutcome::Completed(_)));

        assert_eq!(first_mock.classification_calls(30) + second_mock.classification_calls(30), 1);
        assert_eq!(first_mock.statistics_calls(30), 2);
        assert_eq!(second_mock.statistics_calls(30), 2);
        assert!(service.catalog().cached_product_info(30).await.is_some());
    }

    #[tokio::test]
    async fn test_global_blacklist_applies_to_every_account() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut service = BoostService::new(store, HashSet::from([30]));
        let (mock, session) = session("acc");
        let booster = service.add_account(session, fast_config());

        let HeartbeatOutcome::Completed(report) = booster.heartbeat().await else {
            panic!("heartbeat did not complete");
        };
        assert!(report.active.is_empty());
        assert_eq!(mock.statistics_calls(30), 0);
    }

    #[tokio::test]
    async fn test_start_stop_all() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut service = BoostService::new(store, HashSet::new());
        service.add_account(session("a").1, fast_config());
        service.add_account(session("b").1, fast_config());

        assert_eq!(service.start_all(false).len(), 2);
        assert!(service.accounts().all(AccountBooster::is_running));
        assert_eq!(
            service.stop_all().await,
            vec!["[a] Boosting stopped".to_string(), "[b] Boosting stopped".to_string()]
        );
        assert_eq!(service.status().lines().count(), 2);
        assert!(service.account("a").is_some());
    }
}
