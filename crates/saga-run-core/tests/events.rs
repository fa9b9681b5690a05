// crates/saga-run-core/tests/events.rs
// ============================================================================
// Module: Event Publisher Tests
// Description: Validate subscription, ordering, and panic isolation.
// Purpose: Ensure one bad subscriber never breaks a publishing operation.
// Dependencies: saga-run-core
// ============================================================================

//! Lifecycle event publisher tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use saga_run_core::EventPublisher;
use saga_run_core::RunEvent;
use saga_run_core::RunEventKind;
use saga_run_core::RunId;
use saga_run_core::Subscription;
use saga_run_core::Timestamp;

fn event(kind: RunEventKind) -> RunEvent {
    RunEvent {
        kind,
        run_id: RunId::new("run-1"),
        step_key: None,
        artifact_id: None,
        run_status: None,
        step_status: None,
        at: Timestamp::from_unix_millis(1_000),
    }
}

#[test]
fn subscribers_receive_events_in_subscription_order() {
    let publisher = EventPublisher::new();
    let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&seen);
    publisher.subscribe(move |_| first.lock().expect("sink").push("first"));
    let second = Arc::clone(&seen);
    publisher.subscribe(move |_| second.lock().expect("sink").push("second"));

    publisher.publish(&event(RunEventKind::RunCreated));
    assert_eq!(*seen.lock().expect("sink"), vec!["first", "second"]);
    assert_eq!(publisher.subscriber_count(), 2);
}

#[test]
fn unsubscribe_stops_delivery_and_tolerates_stale_tokens() {
    let publisher = EventPublisher::new();
    let count = Arc::new(AtomicU64::new(0));

    let sink = Arc::clone(&count);
    let subscription = publisher.subscribe(move |_| {
        sink.fetch_add(1, Ordering::Relaxed);
    });

    publisher.publish(&event(RunEventKind::RunUpdated));
    publisher.unsubscribe(subscription);
    publisher.publish(&event(RunEventKind::RunUpdated));
    assert_eq!(count.load(Ordering::Relaxed), 1);
    assert_eq!(publisher.subscriber_count(), 0);

    // A second unsubscribe with the same token is a no-op.
    publisher.unsubscribe(subscription);
}

#[test]
fn panicking_subscriber_is_isolated_and_counted() {
    let publisher = EventPublisher::new();
    let delivered = Arc::new(AtomicU64::new(0));

    publisher.subscribe(|_| panic!("subscriber bug"));
    let sink = Arc::clone(&delivered);
    publisher.subscribe(move |_| {
        sink.fetch_add(1, Ordering::Relaxed);
    });

    publisher.publish(&event(RunEventKind::StepUpdated));
    publisher.publish(&event(RunEventKind::StepUpdated));

    // Later subscribers still ran, and every swallowed panic was counted.
    assert_eq!(delivered.load(Ordering::Relaxed), 2);
    assert_eq!(publisher.failed_notifications(), 2);
}

#[test]
fn handlers_may_change_the_registry_during_a_publish() {
    let publisher = Arc::new(EventPublisher::new());
    let count = Arc::new(AtomicU64::new(0));

    // A handler that unsubscribes itself on first delivery.
    let token: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let bus = Arc::clone(&publisher);
    let slot = Arc::clone(&token);
    let sink = Arc::clone(&count);
    let subscription = publisher.subscribe(move |_| {
        sink.fetch_add(1, Ordering::Relaxed);
        if let Some(own) = slot.lock().expect("token").take() {
            bus.unsubscribe(own);
        }
    });
    *token.lock().expect("token") = Some(subscription);

    publisher.publish(&event(RunEventKind::RunUpdated));
    publisher.publish(&event(RunEventKind::RunUpdated));

    // Delivered once, then gone; the re-entrant call never blocked.
    assert_eq!(count.load(Ordering::Relaxed), 1);
    assert_eq!(publisher.subscriber_count(), 0);
}

#[test]
fn subscriptions_added_mid_publish_start_with_the_next_event() {
    let publisher = Arc::new(EventPublisher::new());
    let late_deliveries = Arc::new(AtomicU64::new(0));

    let bus = Arc::clone(&publisher);
    let sink = Arc::clone(&late_deliveries);
    publisher.subscribe(move |_| {
        let late_sink = Arc::clone(&sink);
        bus.subscribe(move |_| {
            late_sink.fetch_add(1, Ordering::Relaxed);
        });
    });

    publisher.publish(&event(RunEventKind::RunCreated));
    assert_eq!(late_deliveries.load(Ordering::Relaxed), 0);

    publisher.publish(&event(RunEventKind::RunCompleted));
    // One late subscriber existed for the second publish.
    assert_eq!(late_deliveries.load(Ordering::Relaxed), 1);
}

#[test]
fn events_carry_the_triggering_context() {
    let publisher = EventPublisher::new();
    let seen: Arc<Mutex<Vec<RunEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    publisher.subscribe(move |received| sink.lock().expect("sink").push(received.clone()));

    let sent = event(RunEventKind::RunCompleted);
    publisher.publish(&sent);
    assert_eq!(*seen.lock().expect("sink"), vec![sent]);
}
