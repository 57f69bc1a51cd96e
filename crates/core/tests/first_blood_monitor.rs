//! First Blood monitor integration tests.
//!
//! These tests run detection cycles against the mock CTFd API and verify
//! announcement content, idempotence and persistence.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use ctfdesk_core::{
    ctfd::CtfdError,
    first_blood::{FirstBloodDetector, JsonNotifiedStore, MonitorError, NotifiedStore},
    platform::PlatformError,
    testing::{fixtures, MockScoringApi, RecordingSink},
};

const ALERT_CHANNEL: u64 = 777;

/// Test helper wiring a detector to mocks and a state file.
struct TestHarness {
    api: Arc<MockScoringApi>,
    sink: Arc<RecordingSink>,
    store: Arc<JsonNotifiedStore>,
    detector: FirstBloodDetector,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self::with_state_dir(temp_dir)
    }

    fn with_state_dir(temp_dir: TempDir) -> Self {
        let api = Arc::new(MockScoringApi::new());
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(JsonNotifiedStore::new(temp_dir.path().join("first_bloods.json")));
        let detector = FirstBloodDetector::new(
            api.clone(),
            sink.clone(),
            store.clone(),
            Some(ALERT_CHANNEL),
        );

        Self {
            api,
            sink,
            store,
            detector,
            temp_dir,
        }
    }

    /// Challenge 1 solved by alice (account 7).
    async fn seed_alice(&self, team_id: Option<u64>) {
        self.api.add_challenge(1, "babyweb", "web", 100).await;
        self.api
            .set_solves(
                1,
                vec![fixtures::named_solve("alice", Some(7), "2024-05-04T10:00:00Z")],
            )
            .await;
        self.api.add_user(7, "alice", team_id).await;
    }
}

#[tokio::test]
async fn test_announces_solver_without_team() {
    let h = TestHarness::new();
    h.seed_alice(None).await;

    let report = h.detector.check_once().await.unwrap();

    assert_eq!(report.announced.len(), 1);
    let sent = h.sink.announcements().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ALERT_CHANNEL);
    assert_eq!(sent[0].1.solver_display(), "alice");
    assert_eq!(sent[0].1.challenge_name, "babyweb");
    assert_eq!(sent[0].1.points, 100);
}

#[tokio::test]
async fn test_announces_solver_with_team_suffix() {
    let h = TestHarness::new();
    h.seed_alice(Some(42)).await;
    h.api.add_team(42, "RedTeam").await;

    h.detector.check_once().await.unwrap();

    let sent = h.sink.announcements().await;
    assert_eq!(sent[0].1.solver_display(), "alice (RedTeam)");
    let notice = sent[0].1.notice(chrono::Utc::now());
    assert!(notice.description.contains("alice (RedTeam)"));
}

#[tokio::test]
async fn test_notified_challenge_is_never_announced_twice() {
    let h = TestHarness::new();
    h.seed_alice(None).await;

    h.detector.check_once().await.unwrap();
    h.api.clear_calls().await;
    let second = h.detector.check_once().await.unwrap();

    assert!(second.announced.is_empty());
    assert_eq!(h.sink.count().await, 1);
    // Announced challenges are not even queried again
    assert_eq!(h.api.recorded_calls().await, vec!["challenges".to_string()]);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let h = TestHarness::new();
    h.seed_alice(None).await;
    h.detector.check_once().await.unwrap();
    assert!(h.store.load().unwrap().contains(&1));

    let restarted = TestHarness::with_state_dir(h.temp_dir);
    restarted.seed_alice(None).await;
    restarted.detector.check_once().await.unwrap();

    assert_eq!(restarted.sink.count().await, 0);
    assert_eq!(restarted.detector.notified_count().await, 1);
}

#[tokio::test]
async fn test_reset_reannounces() {
    let h = TestHarness::new();
    h.seed_alice(None).await;
    h.detector.check_once().await.unwrap();

    h.detector.reset().await.unwrap();
    assert!(h.store.load().unwrap().is_empty());

    let report = h.detector.check_once().await.unwrap();
    assert_eq!(report.announced.len(), 1);
    assert_eq!(h.sink.count().await, 2);
}

#[tokio::test]
async fn test_empty_solves_stay_pending() {
    let h = TestHarness::new();
    h.api.add_challenge(2, "heap", "pwn", 500).await;

    let report = h.detector.check_once().await.unwrap();

    assert_eq!(report.pending, 1);
    assert_eq!(h.sink.count().await, 0);
    assert!(!h.detector.is_notified(2).await);
    assert!(h
        .api
        .recorded_calls()
        .await
        .contains(&"submissions/2".to_string()));
}

#[tokio::test]
async fn test_submission_fallback() {
    let h = TestHarness::new();
    h.api.add_challenge(3, "rsa", "crypto", 200).await;
    h.api
        .set_submissions(
            3,
            vec![json!({
                "id": 11,
                "user": {"id": 9, "name": "bob"},
                "team": {"id": 4, "name": "BlueTeam"},
                "date": "2024-05-04T09:30:00.123456Z"
            })],
        )
        .await;

    h.detector.check_once().await.unwrap();

    let sent = h.sink.announcements().await;
    assert_eq!(sent[0].1.solver_display(), "bob (BlueTeam)");
    assert_eq!(sent[0].1.solved_at.format("%H:%M:%S").to_string(), "09:30:00");
}

#[tokio::test]
async fn test_unsorted_solves_use_earliest() {
    let h = TestHarness::new();
    h.api.add_challenge(4, "maze", "rev", 300).await;
    h.api
        .set_solves(
            4,
            vec![
                fixtures::named_solve("carol", None, "2024-05-04T12:00:00Z"),
                fixtures::named_solve("dave", None, "2024-05-04T08:00:00Z"),
            ],
        )
        .await;

    h.detector.check_once().await.unwrap();

    assert_eq!(h.sink.announcements().await[0].1.solver_display(), "dave");
}

#[tokio::test]
async fn test_listing_failure_leaves_state_untouched() {
    let h = TestHarness::new();
    h.seed_alice(None).await;
    h.api.fail_next(CtfdError::Unauthorized).await;

    let result = h.detector.check_once().await;

    assert!(matches!(result, Err(MonitorError::Api(CtfdError::Unauthorized))));
    assert_eq!(h.sink.count().await, 0);
    assert!(!h.temp_dir.path().join("first_bloods.json").exists());
}

#[tokio::test]
async fn test_failed_send_keeps_challenge_pending() {
    let h = TestHarness::new();
    h.seed_alice(None).await;
    h.sink
        .fail_next(PlatformError::Forbidden("Send Messages".to_string()))
        .await;

    let first = h.detector.check_once().await.unwrap();
    assert_eq!(first.failed, 1);
    assert!(!h.detector.is_notified(1).await);

    let second = h.detector.check_once().await.unwrap();
    assert_eq!(second.announced.len(), 1);
    assert_eq!(h.sink.count().await, 1);
}

#[tokio::test]
async fn test_team_mode_solver() {
    let h = TestHarness::new();
    h.api.add_challenge(5, "pcap", "forensics", 150).await;
    h.api
        .set_solves(5, vec![json!({"team_id": 12, "date": 1714816800})])
        .await;
    h.api.add_team(12, "Gophers").await;

    h.detector.check_once().await.unwrap();

    let sent = h.sink.announcements().await;
    assert_eq!(sent[0].1.solver_display(), "Gophers");
    assert_eq!(sent[0].1.category, "forensics");
}

#[tokio::test]
async fn test_unknown_user_stays_pending() {
    let h = TestHarness::new();
    h.api.add_challenge(6, "sqli", "web", 100).await;
    h.api.set_solves(6, vec![json!({"user_id": 404, "date": "2024-05-04T10:00:00Z"})]).await;

    let report = h.detector.check_once().await.unwrap();

    assert_eq!(report.pending, 1);
    assert_eq!(h.sink.count().await, 0);
}

#[tokio::test]
async fn test_no_alert_channel_skips_cycle() {
    let h = TestHarness::new();
    h.seed_alice(None).await;
    h.detector.set_alert_channel(None).await;

    let result = h.detector.check_once().await;

    assert!(matches!(result, Err(MonitorError::NoAlertChannel)));
    assert!(h.api.recorded_calls().await.is_empty());
}
