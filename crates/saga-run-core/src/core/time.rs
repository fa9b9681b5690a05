// crates/saga-run-core/src/core/time.rs
// ============================================================================
// Module: Saga Run Time Model
// Description: Canonical timestamp representation for runs, steps, and events.
// Purpose: Provide deterministic, replayable time values across engine records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The engine uses explicit time values supplied by callers to keep every
//! operation deterministic and replayable. The core never reads wall-clock
//! time directly; hosts must pass a [`Timestamp`] into each mutating call.
//! Staleness arithmetic and summary rendering derive everything from these
//! caller-provided instants.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timezone-aware instant used across engine records.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - Encoded as unix epoch milliseconds (UTC) on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the elapsed milliseconds since `earlier`, saturating at zero
    /// when `earlier` is in the future.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> i64 {
        let delta = self.0.saturating_sub(earlier.0);
        if delta < 0 { 0 } else { delta }
    }

    /// Renders the timestamp as an RFC 3339 string for summaries and audit
    /// records. Falls back to the raw millisecond value when the instant is
    /// outside the representable calendar range.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        let nanos = i128::from(self.0).saturating_mul(1_000_000);
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .and_then(|instant| instant.format(&Rfc3339).ok())
            .unwrap_or_else(|| format!("unix_millis:{}", self.0))
    }
}
