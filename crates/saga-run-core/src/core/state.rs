// crates/saga-run-core/src/core/state.rs
// ============================================================================
// Module: Saga Run State
// Description: Run and step records, lifecycle statuses, and counters.
// Purpose: Capture deterministic run evolution for aggregation and audit.
// Dependencies: crate::core::{coverage, identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Run state captures one execution attempt of a saga spec: the run row, its
//! materialized steps, and the aggregator-written summary. Step rows are
//! created once at run creation and mutated only through the state machine;
//! the run row is mutated only by the aggregator and by cancellation or
//! archival.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::coverage::Classification;
use crate::core::coverage::CoverageVerdict;
use crate::core::coverage::LocusAxis;
use crate::core::coverage::MissingEvidence;
use crate::core::coverage::StepFailure;
use crate::core::coverage::WorkaroundAxis;
use crate::core::identifiers::ActorKey;
use crate::core::identifiers::RunId;
use crate::core::identifiers::SagaId;
use crate::core::identifiers::StepKey;
use crate::core::identifiers::TenantId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Execution Mode
// ============================================================================

/// Execution mode selected at run creation.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Rehearsal run; external side effects should be simulated.
    DryRun,
    /// Live run against real collaborators.
    Live,
}

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Run lifecycle status derived by the aggregator.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - `Passed`, `Failed`, and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No step has progressed yet.
    Pending,
    /// At least one step has progressed and none force an outcome.
    Running,
    /// Every step reached a non-failing terminal status.
    Passed,
    /// A step failed or was blocked, evidence is missing, or the run staled.
    Failed,
    /// Run was cancelled by an operator; sticks through later passes.
    Cancelled,
}

impl RunStatus {
    /// Returns true when the status admits no further derivation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Cancelled)
    }

    /// Returns a stable label for summaries and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Step Status
// ============================================================================

/// Step lifecycle status constrained by the step state machine.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - `Passed`, `Failed`, `Skipped`, and `Blocked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step has not started.
    Pending,
    /// Step is being executed by the runner.
    InProgress,
    /// Step completed with its expected result (evidence-gated).
    Passed,
    /// Step completed with a failure.
    Failed,
    /// Step was intentionally skipped.
    Skipped,
    /// Step cannot proceed due to an external blocker.
    Blocked,
}

impl StepStatus {
    /// Returns true when the status admits no outgoing transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Skipped | Self::Blocked)
    }

    /// Returns a stable label for summaries and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Failure Codes
// ============================================================================

/// Structured failure code supplied by callers on failing steps.
///
/// # Invariants
/// - Opaque UTF-8 string; well-known values are matched exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureCode(String);

impl FailureCode {
    /// Well-known code for steps with no executor implementation.
    pub const NOT_IMPLEMENTED: &'static str = "not_implemented";
    /// Well-known code for steps that failed on an API call.
    pub const API_FAILURE: &'static str = "api_failure";

    /// Creates a new failure code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for FailureCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Step Counters
// ============================================================================

/// Step counters recomputed by each aggregator pass.
///
/// # Invariants
/// - `passed + failed + skipped <= total`.
/// - `total` equals the number of materialized step rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StepCounters {
    /// Total materialized steps.
    pub total: u32,
    /// Steps in `passed`.
    pub passed: u32,
    /// Steps in `failed`.
    pub failed: u32,
    /// Steps in `skipped`.
    pub skipped: u32,
    /// Steps in `in_progress`.
    pub in_progress: u32,
    /// Steps in `pending`.
    pub pending: u32,
    /// Steps in `blocked`.
    pub blocked: u32,
}

// ============================================================================
// SECTION: Run Summary
// ============================================================================

/// Auto-closure marker written when the staleness monitor fails a run.
///
/// # Invariants
/// - Present only on runs closed by the staleness monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoClose {
    /// Human-readable closure reason for audit.
    pub reason: String,
    /// Staleness threshold (milliseconds) in force when the run closed.
    pub threshold_millis: u64,
}

/// Structured run summary written by the aggregator.
///
/// # Invariants
/// - Read-cached, not authoritative for step rows; corrected by the next pass.
/// - `failures` and `missing_evidence` are truncated to the first 100 entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Coarse coverage classification.
    pub classification: Classification,
    /// Refined coverage verdict.
    pub verdict: CoverageVerdict,
    /// Native-to-hacky axis tag.
    pub workaround: WorkaroundAxis,
    /// Core-to-extension axis tag.
    pub locus: LocusAxis,
    /// Rounded completion percentage (`passed / total * 100`).
    pub completion_pct: u8,
    /// Counters as of this pass.
    pub counters: StepCounters,
    /// First 100 step failures.
    pub failures: Vec<StepFailure>,
    /// First 100 missing-evidence entries.
    pub missing_evidence: Vec<MissingEvidence>,
    /// Auto-closure marker when the staleness monitor failed the run.
    pub auto_closed: Option<AutoClose>,
    /// Timestamp of the pass that wrote this summary.
    pub refreshed_at: Timestamp,
}

// ============================================================================
// SECTION: Run Record
// ============================================================================

/// One execution attempt of one saga spec.
///
/// # Invariants
/// - Created once; mutated only by the aggregator, cancellation, and archival.
/// - `ended_at >= started_at` when both are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRun {
    /// Run identifier.
    pub run_id: RunId,
    /// Saga spec identifier this run executes.
    pub saga_id: SagaId,
    /// Optional tenant scope.
    pub tenant_id: Option<TenantId>,
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Derived lifecycle status.
    pub status: RunStatus,
    /// Step counters as of the last aggregator pass.
    pub counters: StepCounters,
    /// Free-form run context supplied at creation.
    pub context: Option<Value>,
    /// Aggregator-written summary.
    pub summary: Option<RunSummary>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// First transition into `running`.
    pub started_at: Option<Timestamp>,
    /// Timestamp of terminal derivation.
    pub ended_at: Option<Timestamp>,
    /// Last liveness signal from an active caller.
    pub last_heartbeat_at: Option<Timestamp>,
    /// True once the run has been archived.
    pub archived: bool,
}

// ============================================================================
// SECTION: Step Record
// ============================================================================

/// One materialized step inside one run.
///
/// # Invariants
/// - Keyed by `(run_id, step_key)`; unique and immutable once created.
/// - `ended_at >= started_at` when both are set.
/// - Status transitions are constrained by the step state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRunStep {
    /// Owning run identifier.
    pub run_id: RunId,
    /// Stable step key from the spec.
    pub step_key: StepKey,
    /// Phase playback order.
    pub phase_order: u32,
    /// Step playback order within the phase.
    pub step_order: u32,
    /// Actor key performing the step.
    pub actor_key: ActorKey,
    /// Step lifecycle status.
    pub status: StepStatus,
    /// Attempt count; incremented only on entry into `in_progress`.
    pub attempts: u32,
    /// Structured failure code when failed.
    pub failure_code: Option<FailureCode>,
    /// Free-text failure message when failed.
    pub failure_message: Option<String>,
    /// Structured result payload (replaced wholesale on update).
    pub result: Option<Value>,
    /// Assertion-summary payload (replaced wholesale on update).
    pub assertions: Option<Value>,
    /// First entry into `in_progress`.
    pub started_at: Option<Timestamp>,
    /// Entry into any terminal status.
    pub ended_at: Option<Timestamp>,
}
