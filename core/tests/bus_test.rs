use std::time::Duration;

use chrono::Duration as ChronoDuration;
use courier_core::{
    BusEvent, EnvelopeStatus, Kind, MessageBus, Payload, Priority, Role, TaskPayload,
};
use serde_json::json;

fn task(text: &str) -> Payload {
    Payload::Task(TaskPayload {
        task: text.to_string(),
        request: text.to_string(),
    })
}

#[tokio::test]
async fn next_envelope_orders_by_priority_then_arrival() {
    let bus = MessageBus::new();

    bus.send(Role::Orchestrator, Role::Backend, task("low"), Priority::Low, None)
        .await;
    bus.send(Role::Orchestrator, Role::Backend, task("high"), Priority::High, None)
        .await;
    bus.send(Role::Orchestrator, Role::Backend, task("medium"), Priority::Medium, None)
        .await;

    let first = bus.next_envelope(Role::Backend).unwrap();
    assert_eq!(first.priority, Priority::High);
    bus.complete(first.id, json!({}));

    let second = bus.next_envelope(Role::Backend).unwrap();
    assert_eq!(second.priority, Priority::Medium);
    bus.complete(second.id, json!({}));

    let third = bus.next_envelope(Role::Backend).unwrap();
    assert_eq!(third.priority, Priority::Low);
}

#[tokio::test]
async fn next_envelope_is_fifo_within_a_priority() {
    let bus = MessageBus::new();

    let a = bus
        .send(Role::Orchestrator, Role::Backend, task("first"), Priority::High, None)
        .await;
    bus.send(Role::Orchestrator, Role::Backend, task("second"), Priority::High, None)
        .await;

    assert_eq!(bus.next_envelope(Role::Backend).unwrap().id, a.id);
}

#[tokio::test]
async fn sends_without_a_conversation_get_distinct_ids() {
    let bus = MessageBus::new();

    let a = bus
        .send(Role::Orchestrator, Role::Backend, task("a"), Priority::Medium, None)
        .await;
    let b = bus
        .send(Role::Orchestrator, Role::Backend, task("b"), Priority::Medium, None)
        .await;

    assert_ne!(a.conversation_id, b.conversation_id);
}

#[tokio::test]
async fn conversation_returns_envelopes_in_send_order() {
    let bus = MessageBus::new();

    let first = bus
        .send(Role::Orchestrator, Role::Backend, task("work"), Priority::High, None)
        .await;
    let conversation = first.conversation_id;
    bus.send(
        Role::Backend,
        Role::Orchestrator,
        Payload::Response { body: json!({"ok": true}) },
        Priority::Medium,
        Some(conversation),
    )
    .await;

    let history = bus.conversation(conversation);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, first.id);
    assert_eq!(history[0].kind, Kind::Task);
    assert_eq!(history[1].kind, Kind::Response);
}

#[tokio::test]
async fn complete_is_one_shot_and_ignores_unknown_ids() {
    let bus = MessageBus::new();

    let envelope = bus
        .send(Role::Orchestrator, Role::Backend, task("work"), Priority::Medium, None)
        .await;

    assert!(bus.complete(envelope.id, json!({"n": 1})));
    assert!(!bus.complete(envelope.id, json!({"n": 2})));
    assert!(!bus.fail(envelope.id, "too late"));
    assert!(!bus.complete(uuid::Uuid::new_v4(), json!({})));

    let stored = bus
        .conversation(envelope.conversation_id)
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(stored.status, EnvelopeStatus::Completed);
    assert_eq!(stored.response, Some(json!({"n": 1})));
    assert!(stored.error.is_none());
    assert!(stored.resolved_at.is_some());
}

#[tokio::test]
async fn fail_records_the_error_and_updates_stats() {
    let bus = MessageBus::new();

    let envelope = bus
        .send(Role::Orchestrator, Role::Backend, task("work"), Priority::Medium, None)
        .await;
    assert!(bus.fail(envelope.id, "boom"));

    let stats = bus.stats();
    assert_eq!(stats.total_messages, 1);
    let backend = &stats.per_role[&Role::Backend];
    assert_eq!(backend.total, 1);
    assert_eq!(backend.pending, 0);
    assert_eq!(backend.failed, 1);

    let stored = bus
        .conversation(envelope.conversation_id)
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(stored.status, EnvelopeStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("boom"));
    assert!(stored.response.is_none());
}

#[tokio::test]
async fn sweep_evicts_resolved_but_never_pending() {
    // Zero retention so terminal envelopes expire on the next send.
    let bus = MessageBus::with_retention(ChronoDuration::zero());

    let pending = bus
        .send(Role::Orchestrator, Role::Backend, task("pending"), Priority::Medium, None)
        .await;
    let resolved = bus
        .send(Role::Orchestrator, Role::Backend, task("resolved"), Priority::Medium, None)
        .await;
    bus.complete(resolved.id, json!({}));

    // Trigger the sweep.
    bus.send(Role::Orchestrator, Role::Frontend, task("tick"), Priority::Medium, None)
        .await;

    let history = bus.conversation(resolved.conversation_id);
    assert!(history.is_empty(), "resolved envelope should be evicted");

    let survivors = bus.conversation(pending.conversation_id);
    assert_eq!(survivors.len(), 1, "pending envelope must survive at any age");
    assert_eq!(survivors[0].id, pending.id);
}

#[tokio::test]
async fn inbox_filters_by_kind_and_omits_resolved() {
    let bus = MessageBus::new();

    let done = bus
        .send(Role::Orchestrator, Role::Backend, task("done"), Priority::Medium, None)
        .await;
    bus.complete(done.id, json!({}));
    bus.send(Role::Orchestrator, Role::Backend, task("open"), Priority::Medium, None)
        .await;
    bus.send(
        Role::Orchestrator,
        Role::Backend,
        Payload::Query { question: "eta?".to_string() },
        Priority::Medium,
        None,
    )
    .await;

    assert_eq!(bus.inbox(Role::Backend, None).len(), 2);
    let tasks = bus.inbox(Role::Backend, Some(Kind::Task));
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, Kind::Task);
}

#[tokio::test]
async fn subscribers_receive_pushed_envelopes() {
    let bus = MessageBus::new();
    let (_id, mut rx) = bus.subscribe(Role::Backend);

    let sent = bus
        .send(Role::Orchestrator, Role::Backend, task("work"), Priority::High, None)
        .await;

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert_eq!(received.id, sent.id);
}

#[tokio::test]
async fn every_subscriber_on_a_role_sees_the_envelope() {
    let bus = MessageBus::new();
    let (_a, mut rx_a) = bus.subscribe(Role::Backend);
    let (_b, mut rx_b) = bus.subscribe(Role::Backend);

    let sent = bus
        .send(Role::Orchestrator, Role::Backend, task("work"), Priority::Medium, None)
        .await;

    for rx in [&mut rx_a, &mut rx_b] {
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(received.id, sent.id);
    }
}

#[tokio::test]
async fn full_subscriber_mailboxes_never_block_the_sender() {
    let bus = MessageBus::new();
    // A subscriber that never drains: 1024 sends fill its mailbox.
    let (_id, mut rx) = bus.subscribe(Role::Backend);
    for i in 0..1024 {
        bus.send(
            Role::Orchestrator,
            Role::Backend,
            task(&format!("work {i}")),
            Priority::Medium,
            None,
        )
        .await;
    }

    // The overflow send must drop the delivery, not stall.
    let overflow = tokio::time::timeout(
        Duration::from_secs(1),
        bus.send(Role::Orchestrator, Role::Backend, task("overflow"), Priority::Medium, None),
    )
    .await
    .expect("send must not block on a full mailbox");

    // The envelope is still recorded even though delivery was dropped.
    assert_eq!(bus.conversation(overflow.conversation_id).len(), 1);
    assert_eq!(bus.inbox(Role::Backend, None).len(), 1025);

    // Queued deliveries are intact.
    let first = rx.recv().await.expect("channel closed");
    match first.payload {
        Payload::Task(t) => assert_eq!(t.task, "work 0"),
        other => panic!("expected a task payload, got {:?}", other),
    }
}

#[tokio::test]
async fn unsubscribed_mailboxes_stop_receiving() {
    let bus = MessageBus::new();
    let (id, mut rx) = bus.subscribe(Role::Backend);
    bus.unsubscribe(id);

    bus.send(Role::Orchestrator, Role::Backend, task("work"), Priority::Medium, None)
        .await;

    // The sender side is dropped on unsubscribe, so the mailbox closes.
    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out");
    assert!(received.is_none());
}

#[tokio::test]
async fn lifecycle_events_are_broadcast() {
    let bus = MessageBus::new();
    let mut events = bus.events();

    let sent = bus
        .send(Role::Orchestrator, Role::Backend, task("work"), Priority::Medium, None)
        .await;
    bus.complete(sent.id, json!({"ok": true}));

    let first = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert!(matches!(first, BusEvent::Sent(e) if e.id == sent.id));

    let second = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert!(matches!(second, BusEvent::Completed(e) if e.id == sent.id));
}

#[tokio::test]
async fn active_conversations_track_participants_in_first_seen_order() {
    let bus = MessageBus::new();

    let first = bus
        .send(Role::Orchestrator, Role::Backend, task("work"), Priority::Medium, None)
        .await;
    bus.send(
        Role::Backend,
        Role::Orchestrator,
        Payload::Response { body: json!({}) },
        Priority::Medium,
        Some(first.conversation_id),
    )
    .await;

    let conversations = bus.active_conversations();
    assert_eq!(conversations.len(), 1);
    let info = &conversations[0];
    assert_eq!(info.conversation_id, first.conversation_id);
    assert_eq!(info.message_count, 2);
    assert_eq!(info.participants, vec![Role::Orchestrator, Role::Backend]);
}
