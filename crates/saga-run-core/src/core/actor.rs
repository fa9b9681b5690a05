// crates/saga-run-core/src/core/actor.rs
// ============================================================================
// Module: Actor Messaging Simulator
// Description: Deterministic virtual identities and simulated actor messages.
// Purpose: Give every run actor a reproducible contact identity and record
//          simulated communications with delivery-lifecycle timestamps.
// Dependencies: crate::core::{hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Every actor declared by a saga spec receives one virtual identity per run.
//! The virtual email and phone are pure deterministic functions of
//! `(run_id, actor_key)` — re-derivation always yields the same identity, so
//! no random seed needs persisting. Messages between actors are append-only
//! records whose lifecycle timestamps are derived from the delivery status at
//! creation time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::sha256_raw;
use crate::core::identifiers::ActorKey;
use crate::core::identifiers::MessageId;
use crate::core::identifiers::RunId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Virtual Identity Derivation
// ============================================================================

/// Domain used for derived virtual email addresses.
const VIRTUAL_EMAIL_DOMAIN: &str = "sagarun.test";
/// Number of digest hex characters kept in the email local part.
const EMAIL_HASH_CHARS: usize = 8;
/// Number of digits in a US-shaped virtual phone number.
const PHONE_DIGITS: usize = 10;

/// Derives the deterministic virtual email for a run actor.
///
/// The address is `{sanitized-actor}.{hash8}@sagarun.test` where `hash8` is
/// the first eight hex characters of `SHA-256("{run_id}:{actor_key}")`.
#[must_use]
pub fn virtual_email(run_id: &RunId, actor_key: &ActorKey) -> String {
    let digest = identity_digest_hex(run_id, actor_key);
    let local: String = actor_key
        .as_str()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '-' })
        .collect();
    let hash = &digest[.. EMAIL_HASH_CHARS];
    format!("{local}.{hash}@{VIRTUAL_EMAIL_DOMAIN}")
}

/// Derives the deterministic US-shaped virtual phone for a run actor.
///
/// Each hex digit of `SHA-256("{run_id}:{actor_key}")` maps to a decimal
/// digit (value mod 10); the first ten digits form `+1XXXXXXXXXX`.
#[must_use]
pub fn virtual_phone(run_id: &RunId, actor_key: &ActorKey) -> String {
    let digest = sha256_raw(&identity_input(run_id, actor_key));
    let mut digits = String::with_capacity(PHONE_DIGITS);
    for byte in digest {
        for nibble in [byte >> 4, byte & 0x0f] {
            if digits.len() == PHONE_DIGITS {
                break;
            }
            digits.push(char::from(b'0' + (nibble % 10)));
        }
        if digits.len() == PHONE_DIGITS {
            break;
        }
    }
    format!("+1{digits}")
}

/// Builds the derivation input for a run actor.
fn identity_input(run_id: &RunId, actor_key: &ActorKey) -> String {
    format!("{}:{}", run_id.as_str(), actor_key.as_str())
}

/// Returns the full lowercase hex digest for a run actor.
fn identity_digest_hex(run_id: &RunId, actor_key: &ActorKey) -> String {
    let digest = sha256_raw(&identity_input(run_id, actor_key));
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ============================================================================
// SECTION: Actor Profiles
// ============================================================================

/// One virtual identity per actor declared in the spec, scoped to one run.
///
/// # Invariants
/// - `(run_id, actor_key)` is unique; created once at run creation, never mutated.
/// - `virtual_email` and `virtual_phone` match the deterministic derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRunActorProfile {
    /// Owning run identifier.
    pub run_id: RunId,
    /// Actor key, unique within the run.
    pub actor_key: ActorKey,
    /// Display name from the spec.
    pub display_name: String,
    /// Role label from the spec.
    pub role: String,
    /// Deterministic virtual email.
    pub virtual_email: String,
    /// Deterministic virtual phone.
    pub virtual_phone: String,
    /// Optional link to a real identity.
    pub real_identity: Option<String>,
}

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Communication channel for a simulated message.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageChannel {
    /// Simulated email.
    Email,
    /// Simulated SMS.
    Sms,
    /// Simulated in-app notification.
    InApp,
}

/// Delivery lifecycle status for a simulated message.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted but not yet sent.
    Queued,
    /// Sent but not yet delivered.
    Sent,
    /// Delivered to the recipient.
    Delivered,
    /// Read by the recipient.
    Read,
    /// Delivery failed.
    Failed,
}

/// One simulated communication between actors (or system to actor).
///
/// # Invariants
/// - Append-only and immutable once created.
/// - `queued_at <= sent_at <= delivered_at <= read_at`; `failed_at >= queued_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRunActorMessage {
    /// Message identifier.
    pub message_id: MessageId,
    /// Owning run identifier.
    pub run_id: RunId,
    /// Communication channel.
    pub channel: MessageChannel,
    /// Delivery status.
    pub status: DeliveryStatus,
    /// Sending actor; `None` means system-generated.
    pub sender: Option<ActorKey>,
    /// Receiving actor (profile must exist for the run).
    pub recipient: ActorKey,
    /// Optional subject line.
    pub subject: Option<String>,
    /// Message body.
    pub body: String,
    /// Queue timestamp (always set).
    pub queued_at: Timestamp,
    /// Send timestamp when the status implies a send.
    pub sent_at: Option<Timestamp>,
    /// Delivery timestamp when the status implies delivery.
    pub delivered_at: Option<Timestamp>,
    /// Read timestamp when the status is `read`.
    pub read_at: Option<Timestamp>,
    /// Failure timestamp when the status is `failed`.
    pub failed_at: Option<Timestamp>,
}

impl SagaRunActorMessage {
    /// Derives the lifecycle timestamps implied by `status` at creation time.
    ///
    /// `queued` populates no send or delivery time; `sent` adds the send
    /// time; `delivered` and `read` add delivery (and read) times; `failed`
    /// populates only the failure time.
    #[must_use]
    pub const fn lifecycle_for(
        status: DeliveryStatus,
        now: Timestamp,
    ) -> (Option<Timestamp>, Option<Timestamp>, Option<Timestamp>, Option<Timestamp>) {
        match status {
            DeliveryStatus::Queued => (None, None, None, None),
            DeliveryStatus::Sent => (Some(now), None, None, None),
            DeliveryStatus::Delivered => (Some(now), Some(now), None, None),
            DeliveryStatus::Read => (Some(now), Some(now), Some(now), None),
            DeliveryStatus::Failed => (None, None, None, Some(now)),
        }
    }
}
