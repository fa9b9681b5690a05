// crates/saga-run-core/src/core/mod.rs
// ============================================================================
// Module: Saga Run Core Model
// Description: Data model for specs, runs, steps, artifacts, actors, and coverage.
// Purpose: Group the canonical record types consumed by the runtime.
// Dependencies: serde, serde_json, sha2, time
// ============================================================================

//! ## Overview
//! The core model holds every record type the engine persists or derives:
//! identifiers, timestamps, the immutable saga spec, run and step rows,
//! artifacts, actor profiles and messages, coverage reports, and lifecycle
//! events. Behavior lives in [`crate::runtime`]; this module is data plus
//! pure derivation helpers.

/// Actor profiles, virtual identities, and simulated messages.
pub mod actor;
/// Append-only evidence records.
pub mod artifact;
/// Coverage classification and report assembly.
pub mod coverage;
/// In-process lifecycle event bus.
pub mod events;
/// Content hashing for checksums and derived identities.
pub mod hashing;
/// Canonical opaque identifiers.
pub mod identifiers;
/// Immutable saga specifications.
pub mod spec;
/// Run and step lifecycle records.
pub mod state;
/// Caller-supplied timestamp model.
pub mod time;

pub use actor::DeliveryStatus;
pub use actor::MessageChannel;
pub use actor::SagaRunActorMessage;
pub use actor::SagaRunActorProfile;
pub use actor::virtual_email;
pub use actor::virtual_phone;
pub use artifact::ArtifactKind;
pub use artifact::SagaRunArtifact;
pub use coverage::Classification;
pub use coverage::CoverageItem;
pub use coverage::CoverageReport;
pub use coverage::CoverageSubject;
pub use coverage::CoverageVerdict;
pub use coverage::FailureClassifier;
pub use coverage::FailureKind;
pub use coverage::HeuristicFailureClassifier;
pub use coverage::IntegritySignals;
pub use coverage::LocusAxis;
pub use coverage::MissingEvidence;
pub use coverage::StepFailure;
pub use coverage::WorkaroundAxis;
pub use events::EventPublisher;
pub use events::RunEvent;
pub use events::RunEventKind;
pub use events::Subscription;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::ActorKey;
pub use identifiers::ArtifactId;
pub use identifiers::MessageId;
pub use identifiers::RequirementId;
pub use identifiers::RunId;
pub use identifiers::SagaId;
pub use identifiers::StepKey;
pub use identifiers::TenantId;
pub use spec::ActorSpec;
pub use spec::DelayPolicy;
pub use spec::EvidenceKind;
pub use spec::PhaseSpec;
pub use spec::SagaSpec;
pub use spec::SpecViolation;
pub use spec::StepSpec;
pub use state::AutoClose;
pub use state::ExecutionMode;
pub use state::FailureCode;
pub use state::RunStatus;
pub use state::RunSummary;
pub use state::SagaRun;
pub use state::SagaRunStep;
pub use state::StepCounters;
pub use state::StepStatus;
pub use time::Timestamp;
