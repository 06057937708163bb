//! Account heartbeat integration tests
//!
//! Drives full heartbeats through the public service API against the mock
//! session client.

use std::collections::HashSet;
use std::sync::Arc;

use boostr::client::{MockAchievement, MockSessionClient, MockTitle, SharedSession};
use boostr::config::BoostConfig;
use boostr::error::Result;
use boostr::scheduler::{AccountBooster, BoostService, HeartbeatOutcome};
use boostr::storage::{JsonFileStore, KeyValueStore, MemoryStore, perfect_titles_key};
use boostr::time;
use chrono::Duration;
use tempfile::TempDir;

fn fast_config() -> BoostConfig {
    BoostConfig {
        request_delay_ms: 1,
        ..Default::default()
    }
}

fn register(service: &mut BoostService, mock: MockSessionClient, config: BoostConfig) -> (Arc<MockSessionClient>, AccountBooster) {
    let mock = Arc::new(mock);
    let session: SharedSession = mock.clone();
    let booster = service.add_account(session, config);
    (mock, booster)
}

async fn completed(booster: &AccountBooster) -> boostr::boost::HeartbeatReport {
    match booster.heartbeat().await {
        HeartbeatOutcome::Completed(report) => report,
        other => panic!("heartbeat did not complete: {:?}", other),
    }
}

async fn assert_disjoint(booster: &AccountBooster, active: &[u32]) {
    let resting: HashSet<u32> = booster.resting_ids().await.into_iter().collect();
    assert!(active.iter().all(|id| !resting.contains(id)), "{:?} overlaps {:?}", active, resting);
}

/// One auto-boost heartbeat skips the perfect and the anti-cheat title and
/// unlocks the most common achievement of the remaining one.
#[tokio::test]
async fn test_first_heartbeat_end_to_end() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(JsonFileStore::new(temp_dir.path())?);
    store.save(&perfect_titles_key("acc"), b"[10]")?;

    let mut service = BoostService::new(store, HashSet::new());
    let mock = MockSessionClient::new("acc")
        .with_title(MockTitle::game(10, "Done").with_achievements(vec![MockAchievement::new("x", 5.0).set()]))
        .with_title(
            MockTitle::game(20, "Shooter")
                .with_anti_cheat()
                .with_achievements(vec![MockAchievement::new("y", 5.0)]),
        )
        .with_title(MockTitle::game(30, "Puzzle").with_achievements(vec![
            MockAchievement::new("rare", 20.0),
            MockAchievement::new("common", 80.0),
        ]));
    let (mock, booster) = register(&mut service, mock, fast_config());

    let before = time::now();
    let report = completed(&booster).await;
    let after = time::now();

    assert_eq!(report.active, vec![30]);
    assert_eq!(mock.unlock_attempts(), vec![(30, "common".to_string())]);
    assert_eq!(mock.unlocked(30), vec!["common".to_string()]);
    assert_eq!(mock.statistics_calls(10), 0);
    assert_eq!(mock.statistics_calls(20), 0);
    assert_eq!(mock.played(), vec![vec![30]]);

    assert!(report.next_achieve_at >= before + Duration::minutes(30));
    assert!(report.next_achieve_at <= after + Duration::minutes(60));
    assert_disjoint(&booster, &report.active).await;
    Ok(())
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let mut service = BoostService::new(Arc::new(MemoryStore::new()), HashSet::new());
    let (_mock, booster) = register(&mut service, MockSessionClient::new("acc"), fast_config());

    assert_eq!(booster.start(false), "[acc] Boosting started");
    assert_eq!(booster.start(false), "[acc] Boosting is already started");
    assert_eq!(booster.start(true), "[acc] Boosting is already started");
    assert!(booster.is_running());

    assert_eq!(booster.stop().await, "[acc] Boosting stopped");
    assert_eq!(booster.stop().await, "[acc] Boosting is already stopped");
    assert!(!booster.is_running());
}

/// A title whose unlocks keep failing leaves the active set and is not
/// retried by later heartbeats.
#[tokio::test]
async fn test_repeated_failures_rest_the_title() {
    let mut service = BoostService::new(Arc::new(MemoryStore::new()), HashSet::new());
    let mock = MockSessionClient::new("acc").with_title(
        MockTitle::game(30, "Broken").with_achievements(vec![MockAchievement::new("a", 50.0)]),
    );
    let (mock, booster) = register(&mut service, mock, fast_config());
    mock.fail_unlocks(30);

    for _ in 0..3 {
        let report = completed(&booster).await;
        assert_eq!(report.active, vec![30]);
        assert_disjoint(&booster, &report.active).await;
    }

    let report = completed(&booster).await;
    assert!(report.active.is_empty());
    assert_eq!(booster.resting_ids().await, vec![30]);
    assert_eq!(mock.unlock_attempts().len(), 4);

    completed(&booster).await;
    assert_eq!(mock.unlock_attempts().len(), 4);
}

#[tokio::test]
async fn test_perfect_title_never_comes_back() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(temp_dir.path())?);
    let mut service = BoostService::new(store.clone(), HashSet::new());
    let mock = MockSessionClient::new("acc")
        .with_title(MockTitle::game(40, "Short").with_achievements(vec![MockAchievement::new("only", 50.0)]));
    let (mock, booster) = register(&mut service, mock, fast_config());

    let report = completed(&booster).await;
    assert!(report.active.is_empty());
    assert!(booster.context().eligibility.is_perfect(40));
    assert!(!booster.context().eligibility.is_eligible(40));

    let saved = store.load(&perfect_titles_key("acc"))?.unwrap_or_default();
    let saved: Vec<u32> = serde_json::from_slice(&saved)?;
    assert_eq!(saved, vec![40]);

    let statistics = mock.statistics_calls(40);
    let report = completed(&booster).await;
    assert!(report.active.is_empty());
    assert_eq!(mock.statistics_calls(40), statistics);
    Ok(())
}

#[tokio::test]
async fn test_disconnected_session_skips_work() {
    let mut service = BoostService::new(Arc::new(MemoryStore::new()), HashSet::new());
    let mock = MockSessionClient::new("acc")
        .with_title(MockTitle::game(30, "Puzzle").with_achievements(vec![MockAchievement::new("a", 1.0)]));
    let (mock, booster) = register(&mut service, mock, fast_config());
    mock.set_usable(false);

    assert_eq!(booster.heartbeat().await, HeartbeatOutcome::Disconnected);
    assert!(mock.unlock_attempts().is_empty());

    mock.set_usable(true);
    assert_eq!(completed(&booster).await.active, vec![30]);
}

#[tokio::test]
async fn test_card_farming_takes_over_and_hands_back() {
    let mut service = BoostService::new(Arc::new(MemoryStore::new()), HashSet::new());
    let achievements = || vec![MockAchievement::new("a", 10.0), MockAchievement::new("b", 20.0), MockAchievement::new("c", 30.0)];
    let mock = MockSessionClient::new("acc")
        .with_title(MockTitle::game(1, "One").with_achievements(achievements()))
        .with_title(MockTitle::game(2, "Two").with_achievements(achievements()));
    let (mock, booster) = register(&mut service, mock, fast_config());

    let report = completed(&booster).await;
    assert_eq!(report.mode.to_string(), "auto-boost");
    assert_eq!(report.active, vec![1]);

    mock.set_farming(vec![2]);
    let report = completed(&booster).await;
    assert_eq!(report.mode.to_string(), "card-farming");
    assert_eq!(report.active, vec![2]);
    assert_disjoint(&booster, &report.active).await;
    assert_eq!(mock.resume_calls(), 1);

    mock.set_farming(Vec::new());
    let report = completed(&booster).await;
    assert_eq!(report.mode.to_string(), "auto-boost");
    assert_eq!(report.active.len(), 1);
    assert_disjoint(&booster, &report.active).await;
}
