// crates/saga-run-core/src/runtime/gate.rs
// ============================================================================
// Module: Evidence Gate
// Description: Evidence policy consulted before a step may pass.
// Purpose: Require real execution evidence for terminal success.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Step updates are often supplied by autonomous agents, so the gate is the
//! one server-enforced proof that an actual call occurred independent of what
//! the caller self-reports: a step may enter `passed` only when at least one
//! `api_trace` artifact exists for that `(run_id, step_key)`.
//!
//! The richer per-step completeness check against the spec's declared
//! evidence kinds is advisory only — it feeds the coverage verdict and never
//! blocks a transition.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::ArtifactKind;
use crate::core::EvidenceKind;
use crate::core::MissingEvidence;
use crate::core::RunId;
use crate::core::StepKey;
use crate::core::spec::StepSpec;
use crate::interfaces::ArtifactLedger;
use crate::interfaces::LedgerError;

// ============================================================================
// SECTION: Hard Gate
// ============================================================================

/// Outcome of the hard pass gate.
///
/// # Invariants
/// - `Missing` identifies the step that lacks trace evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// At least one `api_trace` artifact exists for the step.
    Satisfied,
    /// No trace evidence exists; the pass must be rejected.
    Missing,
}

/// Checks the hard `api_trace`-on-pass precondition for one step.
///
/// # Errors
///
/// Returns [`LedgerError`] when the ledger cannot be queried.
pub fn check_pass_evidence(
    ledger: &dyn ArtifactLedger,
    run_id: &RunId,
    step_key: &StepKey,
) -> Result<GateOutcome, LedgerError> {
    let traces = ledger.count_by_kind(run_id, Some(step_key), ArtifactKind::ApiTrace)?;
    if traces >= 1 {
        Ok(GateOutcome::Satisfied)
    } else {
        Ok(GateOutcome::Missing)
    }
}

// ============================================================================
// SECTION: Advisory Completeness
// ============================================================================

/// Computes the advisory missing-evidence entry for one step against its
/// spec-declared requirements. Returns `None` when every required kind has at
/// least one artifact.
///
/// # Errors
///
/// Returns [`LedgerError`] when the ledger cannot be queried.
pub fn missing_evidence_for_step(
    ledger: &dyn ArtifactLedger,
    run_id: &RunId,
    step: &StepSpec,
) -> Result<Option<MissingEvidence>, LedgerError> {
    let mut missing: Vec<EvidenceKind> = Vec::new();
    for kind in &step.evidence_required {
        let artifact_kind = ArtifactKind::for_evidence(*kind);
        let count = ledger.count_by_kind(run_id, Some(&step.step_key), artifact_kind)?;
        if count == 0 {
            missing.push(*kind);
        }
    }
    if missing.is_empty() {
        Ok(None)
    } else {
        Ok(Some(MissingEvidence {
            step_key: step.step_key.clone(),
            kinds: missing,
        }))
    }
}
