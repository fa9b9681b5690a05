// crates/saga-run-core/src/core/spec.rs
// ============================================================================
// Module: Saga Specification
// Description: Immutable saga specs with phases, steps, actors, and evidence.
// Purpose: Define the external scenario input consumed at run creation.
// Dependencies: crate::core::identifiers, serde, thiserror
// ============================================================================

//! ## Overview
//! A saga spec is a declarative multi-phase test scenario: an ordered tree of
//! phases and steps with actor assignments and per-step evidence
//! requirements. The spec is owned by an external provider and is never
//! mutated by the engine; runs materialize from a validated snapshot of it.
//!
//! Playback order is deterministic: phases sort by `order`, steps sort by
//! `order` within their phase, with declaration order breaking ties.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ActorKey;
use crate::core::identifiers::RequirementId;
use crate::core::identifiers::SagaId;
use crate::core::identifiers::StepKey;

// ============================================================================
// SECTION: Evidence Requirements
// ============================================================================

/// Evidence kinds a step may require before it counts as fully covered.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// Captured API request/response trace.
    ApiTrace,
    /// UI or data snapshot.
    Snapshot,
    /// Free-form report note.
    ReportNote,
    /// Reference to an observed lifecycle event.
    EventRef,
}

impl EvidenceKind {
    /// Returns a stable label for summaries and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiTrace => "api_trace",
            Self::Snapshot => "snapshot",
            Self::ReportNote => "report_note",
            Self::EventRef => "event_ref",
        }
    }
}

// ============================================================================
// SECTION: Spec Tree
// ============================================================================

/// Delay policy applied before a step is eligible for execution.
///
/// # Invariants
/// - The engine records the policy; enforcement belongs to the external runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayPolicy {
    /// Milliseconds the runner should wait after the prior step completes.
    pub after_millis: u64,
}

/// Actor declared by a saga spec.
///
/// # Invariants
/// - `actor_key` is unique within the spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSpec {
    /// Actor key referenced by steps.
    pub actor_key: ActorKey,
    /// Human-readable display name.
    pub display_name: String,
    /// Role label (for example "customer" or "staff").
    pub role: String,
}

/// One step inside a phase.
///
/// # Invariants
/// - `step_key` is unique across the whole spec.
/// - `actor_key` refers to a declared [`ActorSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Stable step key.
    pub step_key: StepKey,
    /// Numeric order within the phase.
    pub order: u32,
    /// Actor key performing the step.
    pub actor_key: ActorKey,
    /// Instruction text for the runner.
    pub instruction: String,
    /// Expected result text used for assertion review.
    pub expected_result: String,
    /// Optional delay policy before the step becomes eligible.
    pub delay: Option<DelayPolicy>,
    /// Evidence kinds required for full coverage of this step.
    pub evidence_required: Vec<EvidenceKind>,
}

/// One phase grouping an ordered list of steps.
///
/// # Invariants
/// - `order` determines deterministic playback position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Stable phase key.
    pub phase_key: String,
    /// Numeric order within the spec.
    pub order: u32,
    /// Phase title.
    pub title: String,
    /// Ordered steps for this phase.
    pub steps: Vec<StepSpec>,
}

/// Declarative multi-phase saga specification.
///
/// # Invariants
/// - Immutable once loaded; the engine never mutates a spec.
/// - Step keys are globally unique; actor references resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaSpec {
    /// Saga identifier.
    pub saga_id: SagaId,
    /// Saga title.
    pub title: String,
    /// Requirements (use cases or personas) this saga covers.
    pub requirements: Vec<RequirementId>,
    /// Declared actors.
    pub actors: Vec<ActorSpec>,
    /// Ordered phases.
    pub phases: Vec<PhaseSpec>,
}

// ============================================================================
// SECTION: Spec Validation
// ============================================================================

/// Violations detected while validating a saga spec.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecViolation {
    /// Spec declares no phases.
    #[error("saga {0} declares no phases")]
    NoPhases(SagaId),
    /// Spec declares no steps across all phases.
    #[error("saga {0} declares no steps")]
    NoSteps(SagaId),
    /// Step key appears more than once.
    #[error("saga {saga_id} declares duplicate step key {step_key}")]
    DuplicateStepKey {
        /// Saga identifier.
        saga_id: SagaId,
        /// Duplicated step key.
        step_key: StepKey,
    },
    /// Actor key appears more than once.
    #[error("saga {saga_id} declares duplicate actor key {actor_key}")]
    DuplicateActorKey {
        /// Saga identifier.
        saga_id: SagaId,
        /// Duplicated actor key.
        actor_key: ActorKey,
    },
    /// Step references an actor that is not declared.
    #[error("saga {saga_id} step {step_key} references undeclared actor {actor_key}")]
    UnknownActor {
        /// Saga identifier.
        saga_id: SagaId,
        /// Referencing step key.
        step_key: StepKey,
        /// Missing actor key.
        actor_key: ActorKey,
    },
}

impl SagaSpec {
    /// Validates the spec's structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`SpecViolation`] encountered in playback order.
    pub fn validate(&self) -> Result<(), SpecViolation> {
        if self.phases.is_empty() {
            return Err(SpecViolation::NoPhases(self.saga_id.clone()));
        }
        if self.phases.iter().all(|phase| phase.steps.is_empty()) {
            return Err(SpecViolation::NoSteps(self.saga_id.clone()));
        }

        let mut actor_keys = BTreeSet::new();
        for actor in &self.actors {
            if !actor_keys.insert(actor.actor_key.clone()) {
                return Err(SpecViolation::DuplicateActorKey {
                    saga_id: self.saga_id.clone(),
                    actor_key: actor.actor_key.clone(),
                });
            }
        }

        let mut step_keys = BTreeSet::new();
        for (_, _, step) in self.ordered_steps() {
            if !step_keys.insert(step.step_key.clone()) {
                return Err(SpecViolation::DuplicateStepKey {
                    saga_id: self.saga_id.clone(),
                    step_key: step.step_key.clone(),
                });
            }
            if !actor_keys.contains(&step.actor_key) {
                return Err(SpecViolation::UnknownActor {
                    saga_id: self.saga_id.clone(),
                    step_key: step.step_key.clone(),
                    actor_key: step.actor_key.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns all steps in deterministic playback order as
    /// `(phase_order, step_order, step)` triples.
    #[must_use]
    pub fn ordered_steps(&self) -> Vec<(u32, u32, &StepSpec)> {
        let mut phases: Vec<&PhaseSpec> = self.phases.iter().collect();
        phases.sort_by_key(|phase| phase.order);

        let mut out = Vec::new();
        for phase in phases {
            let mut steps: Vec<&StepSpec> = phase.steps.iter().collect();
            steps.sort_by_key(|step| step.order);
            for step in steps {
                out.push((phase.order, step.order, step));
            }
        }
        out
    }

    /// Returns the step spec for a step key, if declared.
    #[must_use]
    pub fn step(&self, step_key: &StepKey) -> Option<&StepSpec> {
        self.phases
            .iter()
            .flat_map(|phase| phase.steps.iter())
            .find(|step| &step.step_key == step_key)
    }

    /// Returns the total number of declared steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.phases.iter().map(|phase| phase.steps.len()).sum()
    }
}
