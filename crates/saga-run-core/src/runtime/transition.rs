// crates/saga-run-core/src/runtime/transition.rs
// ============================================================================
// Module: Step State Machine
// Description: Transition legality for step lifecycle statuses.
// Purpose: Constrain step mutations to the declared state machine.
// Dependencies: crate::core::state
// ============================================================================

//! ## Overview
//! Steps move `pending → in_progress → {passed, failed, skipped, blocked}`.
//! The four outcome states are terminal with no outgoing transitions. A
//! request with `from == to` is always accepted as an idempotent
//! re-assertion; every other unlisted pair is rejected and leaves the step
//! row untouched.
//!
//! Validation is only correct when transitions for one `(run_id, step_key)`
//! are linearized by the backing store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::state::StepStatus;

// ============================================================================
// SECTION: Transition Legality
// ============================================================================

/// Returns true when `from → to` is a legal step transition.
#[must_use]
pub const fn allowed_transition(from: StepStatus, to: StepStatus) -> bool {
    if from as u8 == to as u8 {
        return true;
    }
    match from {
        StepStatus::Pending => matches!(to, StepStatus::InProgress),
        StepStatus::InProgress => matches!(
            to,
            StepStatus::Passed | StepStatus::Failed | StepStatus::Skipped | StepStatus::Blocked
        ),
        StepStatus::Passed | StepStatus::Failed | StepStatus::Skipped | StepStatus::Blocked => {
            false
        }
    }
}

/// Returns true when the transition enters `in_progress` from another state,
/// which is the only point where the attempt count increments.
#[must_use]
pub const fn enters_in_progress(from: StepStatus, to: StepStatus) -> bool {
    matches!(to, StepStatus::InProgress) && !matches!(from, StepStatus::InProgress)
}
