//! Status endpoint tests.
//!
//! The router runs in-process against mock platform and CTFd dependencies.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ctfdesk_bot::api::create_router;
use ctfdesk_bot::state::AppState;
use ctfdesk_core::testing::{fixtures, MockChatPlatform, MockScoringApi, RecordingSink};
use ctfdesk_core::ticket::CreateTicketRequest;
use ctfdesk_core::{
    create_event_system, load_config_from_str, CooldownStore, FirstBloodDetector,
    JsonNotifiedStore, PollScheduler, SqliteTicketStore, TicketController, TicketStore,
};

const CONFIG: &str = r#"
[discord]
token = "discord-secret"
guild_id = 1

[ctfd]
url = "https://ctf.example.org"
api_token = "ctfd-secret"
alert_channel_id = 777
"#;

/// Router over an app state built from mocks.
struct TestFixture {
    router: Router,
    store: Arc<SqliteTicketStore>,
    scheduler: Option<Arc<PollScheduler>>,
    _temp_dir: TempDir,
}

struct TestResponse {
    status: StatusCode,
    body: String,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("Response should be JSON")
    }
}

impl TestFixture {
    async fn new(with_monitor: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = load_config_from_str(CONFIG).expect("Config should parse");

        let platform = Arc::new(MockChatPlatform::new());
        let store = Arc::new(
            SqliteTicketStore::new(&temp_dir.path().join("test.db"))
                .expect("Failed to create ticket store"),
        );
        let (events, _relay) = create_event_system(platform.clone(), None, 10);
        let controller = Arc::new(TicketController::new(
            fixtures::tickets_config(),
            store.clone(),
            platform,
            Arc::new(CooldownStore::new(Duration::from_secs(300))),
            events,
        ));

        let scheduler = with_monitor.then(|| {
            let detector = FirstBloodDetector::new(
                Arc::new(MockScoringApi::new()),
                Arc::new(RecordingSink::new()),
                Arc::new(JsonNotifiedStore::new(temp_dir.path().join("first_bloods.json"))),
                Some(777),
            );
            Arc::new(PollScheduler::new(
                Arc::new(detector),
                Duration::from_secs(30),
            ))
        });

        let state = Arc::new(AppState::new(config, controller, scheduler.clone()));

        Self {
            router: create_router(state),
            store,
            scheduler,
            _temp_dir: temp_dir,
        }
    }

    async fn get(&self, path: &str) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(path)
                    .body(Body::empty())
                    .expect("Failed to build request"),
            )
            .await
            .expect("Request failed");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();

        TestResponse {
            status,
            body: String::from_utf8_lossy(&bytes).to_string(),
        }
    }
}

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new(false).await;

    let response = fixture.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "ok");
}

#[tokio::test]
async fn test_config_hides_secrets() {
    let fixture = TestFixture::new(true).await;

    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.body.contains("discord-secret"));
    assert!(!response.body.contains("ctfd-secret"));
    let json = response.json();
    assert_eq!(json["discord"]["token_configured"], true);
    assert_eq!(json["ctfd"]["api_token_configured"], true);
}

#[tokio::test]
async fn test_open_tickets() {
    let fixture = TestFixture::new(false).await;
    fixture
        .store
        .create(CreateTicketRequest {
            channel_id: 5000,
            owner_id: 42,
            ticket_type: "General".to_string(),
        })
        .unwrap();

    let response = fixture.get("/api/v1/tickets").await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["count"], 1);
    assert_eq!(json["tickets"][0]["channel_id"], 5000);
    assert_eq!(json["tickets"][0]["status"], "open");
}

#[tokio::test]
async fn test_monitor_unavailable_without_ctfd() {
    let fixture = TestFixture::new(false).await;

    let response = fixture.get("/api/v1/monitor").await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["available"], false);
    assert_eq!(json["running"], false);
}

#[tokio::test]
async fn test_monitor_status_reflects_scheduler() {
    let fixture = TestFixture::new(true).await;
    let scheduler = fixture.scheduler.clone().unwrap();

    assert!(scheduler.start());
    let response = fixture.get("/api/v1/monitor").await;
    scheduler.stop();

    let json = response.json();
    assert_eq!(json["available"], true);
    assert_eq!(json["running"], true);
    assert_eq!(json["interval_secs"], 30);
    assert_eq!(json["alert_channel_id"], 777);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new(true).await;

    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("ctfdesk_tickets_open"));
    assert!(response.body.contains("ctfdesk_monitor_running"));
}

#[tokio::test]
async fn test_unknown_route() {
    let fixture = TestFixture::new(false).await;

    let response = fixture.get("/api/v1/nope").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
