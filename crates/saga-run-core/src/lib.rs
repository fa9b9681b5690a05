// crates/saga-run-core/src/lib.rs
// ============================================================================
// Module: Saga Run Core
// Description: Saga run lifecycle engine: state machine, gates, aggregation.
// Purpose: Execute declarative multi-phase sagas with evidence-gated steps.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! `saga-run-core` executes one run of a declarative multi-phase test
//! scenario (a saga): it materializes runs and steps from an immutable spec,
//! validates step status transitions through a strict state machine, gates
//! terminal success behind captured evidence, derives run-level status and a
//! three-axis coverage verdict from the aggregate of step outcomes, detects
//! and auto-closes stalled runs, and publishes lifecycle events to in-process
//! subscribers.
//!
//! The engine is fully synchronous: every operation is invoked by an external
//! caller with an explicit timestamp and runs to completion before returning.
//! Persistence, spec parsing, authorization, and transport are collaborator
//! seams defined in [`interfaces`].

/// Canonical record types and pure derivations.
pub mod core;
/// Collaborator seams: spec provider, ledger, store, access, metrics.
pub mod interfaces;
/// The state machine, evidence gate, aggregator, and orchestrator.
pub mod runtime;

pub use core::ActorKey;
pub use core::ActorSpec;
pub use core::ArtifactId;
pub use core::ArtifactKind;
pub use core::AutoClose;
pub use core::Classification;
pub use core::CoverageItem;
pub use core::CoverageReport;
pub use core::CoverageSubject;
pub use core::CoverageVerdict;
pub use core::DelayPolicy;
pub use core::DeliveryStatus;
pub use core::EventPublisher;
pub use core::EvidenceKind;
pub use core::ExecutionMode;
pub use core::FailureClassifier;
pub use core::FailureCode;
pub use core::FailureKind;
pub use core::HashDigest;
pub use core::HeuristicFailureClassifier;
pub use core::IntegritySignals;
pub use core::LocusAxis;
pub use core::MessageChannel;
pub use core::MessageId;
pub use core::MissingEvidence;
pub use core::PhaseSpec;
pub use core::RequirementId;
pub use core::RunEvent;
pub use core::RunEventKind;
pub use core::RunId;
pub use core::RunStatus;
pub use core::RunSummary;
pub use core::SagaId;
pub use core::SagaRun;
pub use core::SagaRunActorMessage;
pub use core::SagaRunActorProfile;
pub use core::SagaRunArtifact;
pub use core::SagaRunStep;
pub use core::SagaSpec;
pub use core::SpecViolation;
pub use core::StepCounters;
pub use core::StepFailure;
pub use core::StepKey;
pub use core::StepSpec;
pub use core::StepStatus;
pub use core::Subscription;
pub use core::TenantId;
pub use core::Timestamp;
pub use core::WorkaroundAxis;
pub use interfaces::AccessDecider;
pub use interfaces::AccessDecision;
pub use interfaces::AccessRequest;
pub use interfaces::AllowAllAccess;
pub use interfaces::ArtifactBody;
pub use interfaces::ArtifactLedger;
pub use interfaces::EngineMetricEvent;
pub use interfaces::EngineOperation;
pub use interfaces::EngineMetrics;
pub use interfaces::LedgerError;
pub use interfaces::NewArtifact;
pub use interfaces::NoopMetrics;
pub use interfaces::RunStore;
pub use interfaces::SpecProvider;
pub use interfaces::SpecProviderError;
pub use interfaces::StoreError;
pub use runtime::AggregateOutcome;
pub use runtime::CallerContext;
pub use runtime::CreateMessageRequest;
pub use runtime::CreateRunRequest;
pub use runtime::DEFAULT_STALE_THRESHOLD_MILLIS;
pub use runtime::EngineError;
pub use runtime::GateOutcome;
pub use runtime::InMemoryArtifactLedger;
pub use runtime::InMemoryRunStore;
pub use runtime::InMemorySpecProvider;
pub use runtime::OrchestratorConfig;
pub use runtime::RefreshOptions;
pub use runtime::RunOrchestrator;
pub use runtime::StalenessPolicy;
pub use runtime::StepUpdateOutcome;
pub use runtime::UpdateStepRequest;
