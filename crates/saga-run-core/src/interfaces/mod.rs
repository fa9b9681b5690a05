// crates/saga-run-core/src/interfaces/mod.rs
// ============================================================================
// Module: Saga Run Interfaces
// Description: Backend-agnostic seams for specs, evidence, storage, and access.
// Purpose: Define the contract surfaces used by the saga run runtime.
// Dependencies: crate::core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the engine integrates with external collaborators
//! without embedding backend-specific details. Implementations must be
//! deterministic and fail closed on missing or invalid data. The engine never
//! implements authorization or spec parsing itself; it consumes decisions and
//! parsed specs at these boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::ArtifactId;
use crate::core::ArtifactKind;
use crate::core::CoverageReport;
use crate::core::RunId;
use crate::core::SagaId;
use crate::core::SagaRun;
use crate::core::SagaRunActorMessage;
use crate::core::SagaRunActorProfile;
use crate::core::SagaRunArtifact;
use crate::core::SagaRunStep;
use crate::core::SagaSpec;
use crate::core::SpecViolation;
use crate::core::StepKey;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::hash_bytes;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::ActorKey;

// ============================================================================
// SECTION: Spec Provider
// ============================================================================

/// Spec provider errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SpecProviderError {
    /// No spec exists for the saga identifier.
    #[error("saga spec not found: {0}")]
    SpecNotFound(SagaId),
    /// The spec exists but fails structural validation.
    #[error("saga spec invalid: {0}")]
    SpecInvalid(#[from] SpecViolation),
    /// The provider itself failed.
    #[error("spec provider error: {0}")]
    Provider(String),
}

/// External provider of parsed, validated saga specs.
pub trait SpecProvider {
    /// Loads the spec for a saga identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SpecProviderError`] when the spec is absent or malformed.
    fn load(&self, saga_id: &SagaId) -> Result<SagaSpec, SpecProviderError>;
}

// ============================================================================
// SECTION: Artifact Ledger
// ============================================================================

/// Artifact ledger errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Body could not be canonicalized for hashing.
    #[error("artifact hashing failure: {0}")]
    Hashing(String),
    /// Ledger backend reported an error.
    #[error("artifact ledger error: {0}")]
    Ledger(String),
}

/// Body of an artifact being appended.
///
/// # Invariants
/// - JSON bodies are checksummed over their canonical (JCS) byte form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactBody {
    /// Structured JSON body.
    Json(Value),
    /// Raw byte body.
    Bytes(Vec<u8>),
}

/// Append request accepted by the artifact ledger.
///
/// # Invariants
/// - `step_key` of `None` anchors run-level evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArtifact {
    /// Owning run identifier.
    pub run_id: RunId,
    /// Anchoring step key, if any.
    pub step_key: Option<StepKey>,
    /// Artifact type.
    pub kind: ArtifactKind,
    /// Human-readable title.
    pub title: String,
    /// Storage locator (opaque to the engine).
    pub locator: String,
    /// Declared content type.
    pub content_type: String,
    /// Artifact body used for checksum and size derivation.
    pub body: ArtifactBody,
}

impl NewArtifact {
    /// Finalizes the request into an immutable artifact record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Hashing`] when a JSON body cannot be
    /// canonicalized.
    pub fn into_record(
        self,
        artifact_id: ArtifactId,
        captured_at: Timestamp,
    ) -> Result<SagaRunArtifact, LedgerError> {
        let (checksum, byte_size) = match &self.body {
            ArtifactBody::Json(value) => {
                let canonical = serde_jcs::to_vec(value)
                    .map_err(|err| LedgerError::Hashing(err.to_string()))?;
                let digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, value)
                    .map_err(|err| LedgerError::Hashing(err.to_string()))?;
                (digest, canonical.len() as u64)
            }
            ArtifactBody::Bytes(bytes) => {
                (hash_bytes(DEFAULT_HASH_ALGORITHM, bytes), bytes.len() as u64)
            }
        };
        Ok(SagaRunArtifact {
            artifact_id,
            run_id: self.run_id,
            step_key: self.step_key,
            kind: self.kind,
            title: self.title,
            locator: self.locator,
            content_type: self.content_type,
            byte_size,
            checksum,
            captured_at,
        })
    }
}

/// Append-only store of evidence records keyed by run and step.
pub trait ArtifactLedger {
    /// Appends an artifact and returns the finalized record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when hashing or the backend fails.
    fn append(
        &self,
        artifact: NewArtifact,
        captured_at: Timestamp,
    ) -> Result<SagaRunArtifact, LedgerError>;

    /// Counts artifacts of one kind for a run, optionally scoped to a step.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the backend fails.
    fn count_by_kind(
        &self,
        run_id: &RunId,
        step_key: Option<&StepKey>,
        kind: ArtifactKind,
    ) -> Result<u64, LedgerError>;

    /// Lists all artifacts for a run in append order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the backend fails.
    fn list_by_run(&self, run_id: &RunId) -> Result<Vec<SagaRunArtifact>, LedgerError>;
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// Run store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `Conflict` signals a concurrent-write collision and is safe to retry
///   after re-reading; all other variants are terminal for the call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("run store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("run store corruption: {0}")]
    Corrupt(String),
    /// Store data or request is invalid.
    #[error("run store invalid data: {0}")]
    Invalid(String),
    /// Concurrent write detected (for example a unique-key violation).
    #[error("run store conflict: {0}")]
    Conflict(String),
    /// Store reported an error.
    #[error("run store error: {0}")]
    Store(String),
}

/// Persistence seam for runs, steps, actors, messages, and coverage.
///
/// Step mutations for the same `(run_id, step_key)` must be serialized by the
/// backing store; attempt counts are incremented only through
/// [`RunStore::increment_attempts`], never by [`RunStore::save_step`].
pub trait RunStore {
    /// Inserts a new run row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the run id already exists.
    fn insert_run(&self, run: &SagaRun) -> Result<(), StoreError>;

    /// Loads a run by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_run(&self, run_id: &RunId) -> Result<Option<SagaRun>, StoreError>;

    /// Saves an existing run row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when saving fails.
    fn save_run(&self, run: &SagaRun) -> Result<(), StoreError>;

    /// Inserts a new step row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate `(run_id, step_key)`.
    fn insert_step(&self, step: &SagaRunStep) -> Result<(), StoreError>;

    /// Loads one step by run and key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_step(
        &self,
        run_id: &RunId,
        step_key: &StepKey,
    ) -> Result<Option<SagaRunStep>, StoreError>;

    /// Saves an existing step row. The `attempts` field is not written; use
    /// [`RunStore::increment_attempts`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when saving fails.
    fn save_step(&self, step: &SagaRunStep) -> Result<(), StoreError>;

    /// Lists all steps for a run in playback order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing fails.
    fn list_steps(&self, run_id: &RunId) -> Result<Vec<SagaRunStep>, StoreError>;

    /// Atomically increments a step's attempt count at the storage layer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the step is absent or the update fails.
    fn increment_attempts(&self, run_id: &RunId, step_key: &StepKey) -> Result<(), StoreError>;

    /// Inserts an actor profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate `(run_id, actor_key)`.
    fn insert_profile(&self, profile: &SagaRunActorProfile) -> Result<(), StoreError>;

    /// Loads one actor profile by run and key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_profile(
        &self,
        run_id: &RunId,
        actor_key: &ActorKey,
    ) -> Result<Option<SagaRunActorProfile>, StoreError>;

    /// Lists all actor profiles for a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing fails.
    fn list_profiles(&self, run_id: &RunId) -> Result<Vec<SagaRunActorProfile>, StoreError>;

    /// Inserts a simulated actor message (append-only).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_message(&self, message: &SagaRunActorMessage) -> Result<(), StoreError>;

    /// Lists all messages for a run in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing fails.
    fn list_messages(&self, run_id: &RunId) -> Result<Vec<SagaRunActorMessage>, StoreError>;

    /// Replaces the coverage report for a run in one atomic unit: the report
    /// row is upserted by run id, old items are deleted, new items inserted,
    /// and tag values registered idempotently.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the replacement fails; partial
    /// replacements must never be observable.
    fn replace_coverage(&self, report: &CoverageReport) -> Result<(), StoreError>;

    /// Loads the latest coverage report for a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_coverage(&self, run_id: &RunId) -> Result<Option<CoverageReport>, StoreError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Access Decider
// ============================================================================

/// Access request evaluated at the orchestrator boundary.
///
/// # Invariants
/// - This is a pure request container; the decider is the authority.
#[derive(Debug, Clone)]
pub struct AccessRequest<'a> {
    /// Caller user identifier.
    pub user_id: &'a str,
    /// Caller platform role label.
    pub platform_role: &'a str,
    /// Run being accessed.
    pub run_id: &'a RunId,
    /// Tenant scope of the run, when set.
    pub tenant_id: Option<TenantId>,
}

/// Access decision outcome.
///
/// # Invariants
/// - `allowed` is the authoritative decision for the request.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    /// Whether access is allowed.
    pub allowed: bool,
    /// Reason label for audit logs.
    pub reason: String,
}

/// Tenant/access collaborator consulted before run mutations.
pub trait AccessDecider: Send + Sync {
    /// Evaluates an access request; implementations must fail closed.
    fn authorize(&self, request: &AccessRequest<'_>) -> AccessDecision;
}

/// No-op access decider that always allows.
///
/// # Invariants
/// - Always returns an allow decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAccess;

impl AccessDecider for AllowAllAccess {
    fn authorize(&self, _request: &AccessRequest<'_>) -> AccessDecision {
        AccessDecision {
            allowed: true,
            reason: "allow_all".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Engine operation classification for metrics labeling.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOperation {
    /// Run creation.
    CreateRun,
    /// Step status update.
    UpdateStep,
    /// Artifact append.
    SaveArtifact,
    /// On-demand aggregator pass.
    RefreshRun,
    /// Run cancellation.
    CancelRun,
    /// Run archival.
    ArchiveRun,
    /// Simulated message creation.
    CreateMessage,
}

impl EngineOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateRun => "create_run",
            Self::UpdateStep => "update_step",
            Self::SaveArtifact => "save_artifact",
            Self::RefreshRun => "refresh_run",
            Self::CancelRun => "cancel_run",
            Self::ArchiveRun => "archive_run",
            Self::CreateMessage => "create_message",
        }
    }
}

/// Engine operation metric event payload.
///
/// # Invariants
/// - `run_id` is `None` only when the operation failed before run resolution.
#[derive(Debug, Clone)]
pub struct EngineMetricEvent {
    /// Operation that completed.
    pub operation: EngineOperation,
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Run identifier when resolved.
    pub run_id: Option<RunId>,
}

/// Metrics sink for engine operations.
pub trait EngineMetrics: Send + Sync {
    /// Records one completed operation.
    fn record_operation(&self, event: EngineMetricEvent);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl EngineMetrics for NoopMetrics {
    fn record_operation(&self, _event: EngineMetricEvent) {}
}
