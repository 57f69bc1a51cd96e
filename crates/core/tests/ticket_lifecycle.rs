//! Ticket lifecycle integration tests.
//!
//! These tests drive the controller against the mock guild and a SQLite store:
//! open -> claim -> close, plus cooldown, permission and failure paths.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use ctfdesk_core::{
    create_event_system,
    platform::{AccessGrant, AccessLevel, AccessSubject, PlatformError},
    testing::{fixtures, MockChatPlatform, MockOperation},
    ticket::{
        component_ids, OpenTicketRequest, TicketAction, TicketFilter, TicketStatus,
    },
    CooldownStore, SqliteTicketStore, TicketController, TicketFlowError, TicketStore,
};

/// Test helper wiring the controller to mocks.
struct TestHarness {
    platform: Arc<MockChatPlatform>,
    store: Arc<SqliteTicketStore>,
    controller: Option<TicketController>,
    relay: Option<JoinHandle<()>>,
    _temp_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("tickets.db");

        let platform = Arc::new(fixtures::guild().await);
        let store = Arc::new(SqliteTicketStore::new(&db_path).expect("Failed to create store"));
        let cooldown = Arc::new(CooldownStore::new(Duration::from_secs(300)));
        let (events, relay) =
            create_event_system(platform.clone(), Some(fixtures::LOG_CHANNEL_ID), 64);

        let controller = TicketController::new(
            fixtures::tickets_config(),
            store.clone(),
            platform.clone(),
            cooldown,
            events,
        );

        Self {
            platform,
            store,
            controller: Some(controller),
            relay: Some(tokio::spawn(relay.run())),
            _temp_dir: temp_dir,
        }
    }

    fn controller(&self) -> &TicketController {
        self.controller.as_ref().expect("controller already dropped")
    }

    /// Drop the controller and wait until every event reached the log channel.
    async fn flush_events(&mut self) {
        self.controller.take();
        if let Some(relay) = self.relay.take() {
            relay.await.expect("relay panicked");
        }
    }

    fn open_count(&self) -> i64 {
        self.store
            .count(&TicketFilter::new().with_status("open"))
            .unwrap()
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap()
}

fn request(ticket_type: &str) -> OpenTicketRequest {
    OpenTicketRequest {
        ticket_type: ticket_type.to_string(),
        description: "The flag format is rejected by the checker".to_string(),
    }
}

#[tokio::test]
async fn test_open_ticket_provisions_channel() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");

    let opened = h
        .controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();

    assert_eq!(opened.channel_name, "ticket-0001-alice");
    assert_eq!(opened.ticket.owner_id, 42);
    assert_eq!(opened.ticket.ticket_type, "General");
    assert!(opened.ticket.is_open());

    let channel = h.platform.channel(opened.ticket.channel_id).await.unwrap();
    assert_eq!(channel.info.category_id, Some(fixtures::CATEGORY_ID));
    assert_eq!(
        channel.info.topic.as_deref(),
        Some("Owner: <@42> | Type: General")
    );
    assert!(channel
        .grants
        .contains(&AccessGrant::new(AccessSubject::Everyone, AccessLevel::Denied)));
    assert!(channel
        .grants
        .contains(&AccessGrant::new(AccessSubject::Member(42), AccessLevel::Participant)));
    assert!(channel.grants.contains(&AccessGrant::new(
        AccessSubject::Role(fixtures::SUPPORT_ROLE_ID),
        AccessLevel::Staff
    )));
    assert!(channel
        .grants
        .contains(&AccessGrant::new(AccessSubject::Bot, AccessLevel::Manager)));

    let welcome = h.platform.messages_in(opened.ticket.channel_id).await;
    assert_eq!(welcome.len(), 1);
    assert_eq!(welcome[0].content.as_deref(), Some("<@42> <@&200>"));
    let ids: Vec<&str> = welcome[0].controls.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![component_ids::CLAIM, component_ids::CLOSE, component_ids::TRANSCRIPT]
    );

    let logs = h.store.logs(opened.ticket.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, TicketAction::Created);
}

#[tokio::test]
async fn test_second_ticket_within_cooldown_is_rejected() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");

    h.controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();
    let channels_before = h.platform.channel_names().await;

    let result = h
        .controller()
        .open_ticket(&alice, request("Technical"), t0() + chrono::Duration::seconds(60))
        .await;

    match result {
        Err(TicketFlowError::CooldownActive { remaining_secs }) => assert_eq!(remaining_secs, 240),
        other => panic!("expected cooldown rejection, got {:?}", other.map(|o| o.channel_name)),
    }
    assert_eq!(h.platform.channel_names().await, channels_before);
    assert_eq!(h.open_count(), 1);

    // After the window the user may open again
    let second = h
        .controller()
        .open_ticket(&alice, request("Technical"), t0() + chrono::Duration::seconds(301))
        .await
        .unwrap();
    assert_eq!(second.channel_name, "ticket-0002-alice");
}

#[tokio::test]
async fn test_invalid_input_creates_nothing_and_keeps_user_free() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");

    let unknown = h
        .controller()
        .open_ticket(&alice, request("Billing"), t0())
        .await;
    assert!(matches!(unknown, Err(TicketFlowError::UnknownTicketType(_))));

    let short = h
        .controller()
        .open_ticket(
            &alice,
            OpenTicketRequest {
                ticket_type: "General".to_string(),
                description: "help".to_string(),
            },
            t0(),
        )
        .await;
    assert!(matches!(short, Err(TicketFlowError::InvalidDescription)));

    assert_eq!(h.open_count(), 0);
    assert!(h.controller().cooldown_remaining(42, t0()).await.is_none());
}

#[tokio::test]
async fn test_channel_failure_does_not_start_cooldown() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");

    h.platform
        .fail_next(
            MockOperation::CreateChannel,
            PlatformError::Forbidden("Manage Channels".to_string()),
        )
        .await;

    let result = h
        .controller()
        .open_ticket(&alice, request("General"), t0())
        .await;
    assert!(matches!(result, Err(TicketFlowError::Platform(_))));
    assert_eq!(h.open_count(), 0);

    h.controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_close_writes_one_log_and_removes_channel() {
    let mut h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");

    let opened = h
        .controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();
    let channel_id = opened.ticket.channel_id;
    h.platform
        .push_user_message(channel_id, 42, "Alice", "my exploit works locally")
        .await;

    let closed = h
        .controller()
        .close_ticket(&alice, channel_id, t0())
        .await
        .unwrap();

    assert_eq!(closed.ticket.status, TicketStatus::Closed);
    assert_eq!(closed.ticket.closed_by, Some(42));
    assert!(closed.transcript.text.contains("my exploit works locally"));

    let stored = h.store.get(opened.ticket.id).unwrap().unwrap();
    assert_eq!(stored.status, TicketStatus::Closed);

    let logs = h.store.logs(opened.ticket.id).unwrap();
    let closes: Vec<_> = logs
        .iter()
        .filter(|l| matches!(l.action, TicketAction::Closed | TicketAction::ForceClosed))
        .collect();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].action, TicketAction::Closed);

    assert!(h.platform.channel(channel_id).await.is_none());
    assert_eq!(h.platform.deleted_channels().await, vec![channel_id]);

    let transcript = h.store.transcript(opened.ticket.id).unwrap().unwrap();
    assert!(transcript.content.starts_with("=== Transcript: ticket-0001-alice ==="));

    let dms = h.platform.direct_messages().await;
    assert_eq!(dms.len(), 1);
    assert_eq!(dms[0].0, 42);
    let names: Vec<&str> = dms[0].1.attachments.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "ticket-0001-alice_transcript.html",
            "ticket-0001-alice_transcript.txt"
        ]
    );

    h.flush_events().await;
    let log_messages = h.platform.messages_in(fixtures::LOG_CHANNEL_ID).await;
    let titles: Vec<&str> = log_messages
        .iter()
        .filter_map(|m| m.notice.as_ref().map(|n| n.title.as_str()))
        .collect();
    assert_eq!(titles, vec!["Ticket created", "Ticket closed"]);
    assert_eq!(log_messages[1].attachments.len(), 1);
}

#[tokio::test]
async fn test_close_permissions_and_repeat() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");
    let mallory = fixtures::member(66, "Mallory");
    let helper = fixtures::support(300, "Helper");

    let opened = h
        .controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();
    let channel_id = opened.ticket.channel_id;

    let denied = h.controller().close_ticket(&mallory, channel_id, t0()).await;
    assert!(matches!(denied, Err(TicketFlowError::PermissionDenied(_))));
    assert!(h.platform.channel(channel_id).await.is_some());

    h.controller()
        .close_ticket(&helper, channel_id, t0())
        .await
        .unwrap();

    let again = h.controller().close_ticket(&helper, channel_id, t0()).await;
    assert!(matches!(again, Err(TicketFlowError::AlreadyClosed)));
    assert_eq!(h.store.logs(opened.ticket.id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_history_failure_leaves_ticket_open() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");

    let opened = h
        .controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();
    h.platform
        .fail_next(
            MockOperation::FetchHistory,
            PlatformError::Request("gateway timeout".to_string()),
        )
        .await;

    let result = h
        .controller()
        .close_ticket(&alice, opened.ticket.channel_id, t0())
        .await;
    assert!(matches!(result, Err(TicketFlowError::Platform(_))));

    let ticket = h.store.get(opened.ticket.id).unwrap().unwrap();
    assert!(ticket.is_open());
    assert!(h.platform.channel(opened.ticket.channel_id).await.is_some());
}

#[tokio::test]
async fn test_force_close() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");
    let helper = fixtures::support(300, "Helper");
    let admin = fixtures::admin(1000, "Admin");

    let opened = h
        .controller()
        .open_ticket(&alice, request("Report"), t0())
        .await
        .unwrap();
    let channel_id = opened.ticket.channel_id;

    let denied = h.controller().force_close(&helper, channel_id, t0()).await;
    assert!(matches!(denied, Err(TicketFlowError::PermissionDenied(_))));

    h.controller()
        .force_close(&admin, channel_id, t0())
        .await
        .unwrap();

    let logs = h.store.logs(opened.ticket.id).unwrap();
    let last = logs.last().unwrap();
    assert_eq!(last.action, TicketAction::ForceClosed);
    assert_eq!(last.actor_id, 1000);
    assert_eq!(
        last.details.as_ref().unwrap()["reason"],
        serde_json::json!("Admin force close")
    );

    // Owners are not sent a transcript on force close
    assert!(h.platform.direct_messages().await.is_empty());
    assert!(h.platform.channel(channel_id).await.is_none());
}

#[tokio::test]
async fn test_failed_channel_delete_can_be_retried() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");
    let admin = fixtures::admin(1000, "Admin");

    let opened = h
        .controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();
    let channel_id = opened.ticket.channel_id;
    h.platform
        .fail_next(
            MockOperation::DeleteChannel,
            PlatformError::Forbidden("Manage Channels".to_string()),
        )
        .await;

    let result = h.controller().close_ticket(&alice, channel_id, t0()).await;
    assert!(matches!(
        result,
        Err(TicketFlowError::Platform(PlatformError::Forbidden(_)))
    ));
    let ticket = h.store.get(opened.ticket.id).unwrap().unwrap();
    assert_eq!(ticket.status, TicketStatus::Closed);
    assert!(h.platform.channel(channel_id).await.is_some());

    // The owner can still reach the close flow for the leftover channel
    h.controller()
        .authorize_close(&alice, channel_id)
        .await
        .unwrap();

    let removed = h
        .controller()
        .force_close(&admin, channel_id, t0())
        .await
        .unwrap();
    assert_eq!(removed.ticket.id, opened.ticket.id);
    assert_eq!(removed.ticket.closed_by, Some(42));
    assert!(h.platform.channel(channel_id).await.is_none());

    let closes: Vec<_> = h
        .store
        .logs(opened.ticket.id)
        .unwrap()
        .into_iter()
        .filter(|l| matches!(l.action, TicketAction::Closed | TicketAction::ForceClosed))
        .collect();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].action, TicketAction::Closed);

    let again = h.controller().close_ticket(&alice, channel_id, t0()).await;
    assert!(matches!(again, Err(TicketFlowError::AlreadyClosed)));
}

#[tokio::test]
async fn test_leftover_channel_close_respects_permissions() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");
    let mallory = fixtures::member(66, "Mallory");

    let opened = h
        .controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();
    let channel_id = opened.ticket.channel_id;
    h.platform
        .fail_next(
            MockOperation::DeleteChannel,
            PlatformError::Request("gateway timeout".to_string()),
        )
        .await;
    assert!(h
        .controller()
        .close_ticket(&alice, channel_id, t0())
        .await
        .is_err());

    let denied = h.controller().close_ticket(&mallory, channel_id, t0()).await;
    assert!(matches!(denied, Err(TicketFlowError::PermissionDenied(_))));
    assert!(h.platform.channel(channel_id).await.is_some());

    h.controller()
        .close_ticket(&alice, channel_id, t0())
        .await
        .unwrap();
    assert!(h.platform.channel(channel_id).await.is_none());
    assert_eq!(h.store.logs(opened.ticket.id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_force_close_outside_ticket_channel() {
    let h = TestHarness::new().await;
    let admin = fixtures::admin(1000, "Admin");

    let result = h
        .controller()
        .force_close(&admin, fixtures::LOG_CHANNEL_ID, t0())
        .await;
    assert!(matches!(result, Err(TicketFlowError::NotATicketChannel)));
    assert!(h.platform.channel(fixtures::LOG_CHANNEL_ID).await.is_some());
}

#[tokio::test]
async fn test_claim_once() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");
    let helper = fixtures::support(300, "Helper");
    let other = fixtures::support(301, "Other");

    let opened = h
        .controller()
        .open_ticket(&alice, request("Technical"), t0())
        .await
        .unwrap();
    let channel_id = opened.ticket.channel_id;

    let denied = h.controller().claim(&alice, channel_id).await;
    assert!(matches!(denied, Err(TicketFlowError::PermissionDenied(_))));

    h.controller().claim(&helper, channel_id).await.unwrap();
    let topic = h.platform.channel(channel_id).await.unwrap().info.topic.unwrap();
    assert_eq!(topic, "Owner: <@42> | Type: Technical | Claimed by: <@300>");

    match h.controller().claim(&other, channel_id).await {
        Err(TicketFlowError::AlreadyClaimed(by)) => assert_eq!(by, "<@300>"),
        other => panic!("expected AlreadyClaimed, got {:?}", other.map(|t| t.id)),
    }

    let claims = h
        .store
        .logs(opened.ticket.id)
        .unwrap()
        .into_iter()
        .filter(|l| l.action == TicketAction::Claimed)
        .count();
    assert_eq!(claims, 1);
}

#[tokio::test]
async fn test_add_and_remove_member() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");
    let helper = fixtures::support(300, "Helper");

    let opened = h
        .controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();
    let channel_id = opened.ticket.channel_id;

    let denied = h.controller().add_member(&alice, channel_id, 77).await;
    assert!(matches!(denied, Err(TicketFlowError::PermissionDenied(_))));

    h.controller().add_member(&helper, channel_id, 77).await.unwrap();
    assert!(h
        .platform
        .grants(channel_id)
        .await
        .contains(&AccessGrant::new(AccessSubject::Member(77), AccessLevel::Participant)));

    h.controller()
        .remove_member(&helper, channel_id, 77)
        .await
        .unwrap();
    assert!(h
        .platform
        .grants(channel_id)
        .await
        .contains(&AccessGrant::new(AccessSubject::Member(77), AccessLevel::Denied)));

    let owner = h.controller().remove_member(&helper, channel_id, 42).await;
    assert!(matches!(owner, Err(TicketFlowError::PermissionDenied(_))));

    let actions: Vec<TicketAction> = h
        .store
        .logs(opened.ticket.id)
        .unwrap()
        .into_iter()
        .map(|l| l.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            TicketAction::Created,
            TicketAction::MemberAdded,
            TicketAction::MemberRemoved
        ]
    );
}

#[tokio::test]
async fn test_setup_check_and_panel() {
    let h = TestHarness::new().await;

    assert!(h.controller().check_setup().await.unwrap().is_ready());

    let denied = h
        .controller()
        .post_panel(&fixtures::support(300, "Helper"), 555)
        .await;
    assert!(matches!(denied, Err(TicketFlowError::PermissionDenied(_))));

    h.platform.add_channel(555, "support", None).await;
    h.controller()
        .post_panel(&fixtures::admin(1000, "Admin"), 555)
        .await
        .unwrap();
    let panel = h.platform.messages_in(555).await;
    assert_eq!(panel[0].controls[0].id, component_ids::OPEN_TICKET);
    assert_eq!(panel[0].notice.as_ref().unwrap().fields.len(), 3);
}

#[tokio::test]
async fn test_setup_reports_missing_pieces() {
    let platform = Arc::new(MockChatPlatform::new());
    let store = Arc::new(SqliteTicketStore::in_memory().unwrap());
    let (events, _relay) = create_event_system(platform.clone(), None, 8);
    let controller = TicketController::new(
        fixtures::tickets_config(),
        store,
        platform,
        Arc::new(CooldownStore::new(Duration::from_secs(300))),
        events,
    );

    let report = controller.check_setup().await.unwrap();
    assert_eq!(report.problems.len(), 3);
}

#[tokio::test]
async fn test_active_tickets_and_export() {
    let h = TestHarness::new().await;
    let alice = fixtures::member(42, "Alice");
    let bob = fixtures::member(43, "Bob");

    let first = h
        .controller()
        .open_ticket(&alice, request("General"), t0())
        .await
        .unwrap();
    h.controller()
        .open_ticket(&bob, request("General"), t0())
        .await
        .unwrap();

    assert_eq!(h.controller().active_tickets().unwrap().len(), 2);

    h.platform
        .push_user_message(first.ticket.channel_id, 42, "Alice", "<b>bold</b> claim")
        .await;
    let transcript = h
        .controller()
        .export_transcript(first.ticket.channel_id, t0())
        .await
        .unwrap();
    assert_eq!(transcript.message_count, 2);
    assert!(transcript.html.contains("&lt;b&gt;bold&lt;/b&gt; claim"));
    assert!(h.platform.channel(first.ticket.channel_id).await.is_some());
}
