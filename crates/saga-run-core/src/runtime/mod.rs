// crates/saga-run-core/src/runtime/mod.rs
// ============================================================================
// Module: Saga Run Runtime
// Description: State machine, evidence gate, aggregator, and orchestrator.
// Purpose: Drive saga runs through their lifecycle deterministically.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement run execution: the step state machine, the
//! evidence gate, the aggregator/staleness pass, and the orchestrator that
//! ties them together over pluggable storage seams. All mutations run
//! synchronously with caller-supplied timestamps.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod aggregate;
pub mod gate;
pub mod memory;
pub mod orchestrator;
pub mod transition;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregate::AggregateOutcome;
pub use aggregate::DEFAULT_STALE_THRESHOLD_MILLIS;
pub use aggregate::MAX_SUMMARY_ENTRIES;
pub use aggregate::RefreshOptions;
pub use aggregate::StalenessPolicy;
pub use aggregate::refresh_run;
pub use gate::GateOutcome;
pub use gate::check_pass_evidence;
pub use gate::missing_evidence_for_step;
pub use memory::InMemoryArtifactLedger;
pub use memory::InMemoryRunStore;
pub use memory::InMemorySpecProvider;
pub use orchestrator::CallerContext;
pub use orchestrator::CreateMessageRequest;
pub use orchestrator::CreateRunRequest;
pub use orchestrator::EngineError;
pub use orchestrator::OrchestratorConfig;
pub use orchestrator::RunOrchestrator;
pub use orchestrator::StepUpdateOutcome;
pub use orchestrator::UpdateStepRequest;
pub use transition::allowed_transition;
pub use transition::enters_in_progress;
