// crates/saga-run-core/src/core/events.rs
// ============================================================================
// Module: Event Publisher
// Description: In-process pub/sub bus for run lifecycle notifications.
// Purpose: Announce run, step, and artifact transitions to live observers.
// Dependencies: crate::core::{identifiers, state, time}, serde
// ============================================================================

//! ## Overview
//! The event publisher is an injectable, process-local pub/sub bus with an
//! explicit lifecycle: created per process, dropped on shutdown. `publish`
//! notifies all current subscribers synchronously in subscription order with
//! at-most-once, best-effort delivery. Nothing is buffered or persisted — a
//! process restart loses all subscribers, and consumers needing durability
//! must read the run, artifact, and coverage stores, which are the source of
//! truth.
//!
//! A panicking subscriber is isolated and counted; it never propagates into
//! the mutation that triggered the notification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::StepKey;
use crate::core::state::RunStatus;
use crate::core::state::StepStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Lifecycle event kinds announced by the engine.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    /// A run was created from a spec.
    RunCreated,
    /// A run's derived status or summary changed (non-terminal).
    RunUpdated,
    /// A run reached a terminal status.
    RunCompleted,
    /// A terminal run was archived.
    RunArchived,
    /// A step row was mutated through the state machine.
    StepUpdated,
    /// An artifact was appended to the ledger.
    ArtifactCreated,
}

impl RunEventKind {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunCreated => "run.created",
            Self::RunUpdated => "run.updated",
            Self::RunCompleted => "run.completed",
            Self::RunArchived => "run.archived",
            Self::StepUpdated => "step.updated",
            Self::ArtifactCreated => "artifact.created",
        }
    }
}

/// One lifecycle notification.
///
/// # Invariants
/// - `at` is the caller-supplied timestamp of the triggering mutation.
/// - Optional fields are `None` when the kind does not involve them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    /// Event kind.
    pub kind: RunEventKind,
    /// Run identifier.
    pub run_id: RunId,
    /// Step key for step-scoped events.
    pub step_key: Option<StepKey>,
    /// Artifact identifier for artifact events.
    pub artifact_id: Option<ArtifactId>,
    /// Run status after the mutation, when known.
    pub run_status: Option<RunStatus>,
    /// Step status after the mutation, for step events.
    pub step_status: Option<StepStatus>,
    /// Timestamp of the triggering mutation.
    pub at: Timestamp,
}

// ============================================================================
// SECTION: Publisher
// ============================================================================

/// Subscriber callback invoked synchronously on publish.
type EventHandler = Arc<dyn Fn(&RunEvent) + Send + Sync>;

/// Subscription token returned by [`EventPublisher::subscribe`].
///
/// # Invariants
/// - Identifies exactly one handler registration; stale tokens unsubscribe nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    /// Registration identifier.
    id: u64,
}

/// Process-local pub/sub bus for lifecycle events.
///
/// # Invariants
/// - Handlers are notified synchronously in subscription order.
/// - Delivery is best-effort, at-most-once per subscriber, never persisted.
#[derive(Default)]
pub struct EventPublisher {
    /// Registered handlers keyed by subscription id (insertion-ordered).
    handlers: Mutex<BTreeMap<u64, EventHandler>>,
    /// Next subscription id.
    next_id: AtomicU64,
    /// Count of notifications swallowed because a handler panicked.
    failed_notifications: AtomicU64,
}

impl EventPublisher {
    /// Creates an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler and returns its subscription token.
    pub fn subscribe(&self, handler: impl Fn(&RunEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.insert(id, Arc::new(handler));
        Subscription {
            id,
        }
    }

    /// Removes a handler registration; stale tokens are ignored.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.remove(&subscription.id);
    }

    /// Notifies all current subscribers synchronously, in subscription order.
    ///
    /// A panicking handler is isolated and counted so one bad subscriber
    /// cannot break the triggering operation.
    ///
    /// Handlers run outside the registry lock, so a handler may subscribe,
    /// unsubscribe, or publish re-entrantly. Registry changes made during a
    /// publish take effect on the next publish, not the current one.
    pub fn publish(&self, event: &RunEvent) {
        let handlers: Vec<EventHandler> = {
            let registry = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            registry.values().map(Arc::clone).collect()
        };
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                self.failed_notifications.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Returns the number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the count of notifications dropped due to handler panics.
    #[must_use]
    pub fn failed_notifications(&self) -> u64 {
        self.failed_notifications.load(Ordering::Relaxed)
    }
}
