// crates/saga-run-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Run Orchestrator
// Description: Root operations driving runs through the state machine.
// Purpose: Create runs, apply step updates, and trigger aggregation/eventing.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The orchestrator is the engine's root: it materializes runs from specs,
//! drives step updates through the state machine and evidence gate, invokes
//! the aggregator and coverage classifier after every mutation, and publishes
//! lifecycle events. Every operation is synchronous and takes an explicit
//! caller-supplied timestamp; the orchestrator never reads the clock and
//! never retries internally.
//!
//! Failure propagation follows the taxonomy: a step write that succeeded is
//! never rolled back by a later aggregator failure — the run summary is
//! read-cached, not authoritative, and the next successful pass corrects it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::ActorKey;
use crate::core::CoverageReport;
use crate::core::DeliveryStatus;
use crate::core::EventPublisher;
use crate::core::ExecutionMode;
use crate::core::FailureClassifier;
use crate::core::FailureCode;
use crate::core::HeuristicFailureClassifier;
use crate::core::MessageChannel;
use crate::core::MessageId;
use crate::core::RunEvent;
use crate::core::RunEventKind;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::SagaId;
use crate::core::SagaRun;
use crate::core::SagaRunActorMessage;
use crate::core::SagaRunActorProfile;
use crate::core::SagaRunArtifact;
use crate::core::SagaRunStep;
use crate::core::StepCounters;
use crate::core::StepKey;
use crate::core::StepStatus;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::core::actor::virtual_email;
use crate::core::actor::virtual_phone;
use crate::interfaces::AccessDecider;
use crate::interfaces::AccessRequest;
use crate::interfaces::AllowAllAccess;
use crate::interfaces::ArtifactLedger;
use crate::interfaces::EngineMetricEvent;
use crate::interfaces::EngineMetrics;
use crate::interfaces::EngineOperation;
use crate::interfaces::LedgerError;
use crate::interfaces::NewArtifact;
use crate::interfaces::NoopMetrics;
use crate::interfaces::RunStore;
use crate::interfaces::SpecProvider;
use crate::interfaces::SpecProviderError;
use crate::interfaces::StoreError;
use crate::runtime::aggregate::RefreshOptions;
use crate::runtime::aggregate::StalenessPolicy;
use crate::runtime::aggregate::refresh_run;
use crate::runtime::gate::GateOutcome;
use crate::runtime::gate::check_pass_evidence;
use crate::runtime::transition::allowed_transition;
use crate::runtime::transition::enters_in_progress;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Engine error taxonomy surfaced by orchestrator operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - All failures are terminal for the triggering call; only
///   [`StoreError::Conflict`] is safe to retry after re-reading.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A run, step, or actor profile is absent.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind label ("run", "step", "actor profile").
        kind: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },
    /// Requested step transition is not in the state machine.
    #[error("invalid transition for run {run_id} step {step_key}: {from} -> {to}")]
    InvalidTransition {
        /// Run identifier.
        run_id: RunId,
        /// Step key.
        step_key: StepKey,
        /// Current status.
        from: StepStatus,
        /// Requested status.
        to: StepStatus,
    },
    /// Pass attempted without the required trace evidence.
    #[error("evidence missing for run {run_id} step {step_key}: no api_trace artifact")]
    EvidenceMissing {
        /// Run identifier.
        run_id: RunId,
        /// Step key.
        step_key: StepKey,
    },
    /// Spec provider failure (absent or malformed spec).
    #[error(transparent)]
    Spec(#[from] SpecProviderError),
    /// Access collaborator denied the request.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Denial reason from the access decider.
        reason: String,
    },
    /// Run store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Artifact ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Caller identity forwarded to the access collaborator.
///
/// # Invariants
/// - Absence means a trusted internal caller; no access check is performed.
#[derive(Debug, Clone)]
pub struct CallerContext {
    /// Caller user identifier.
    pub user_id: String,
    /// Caller platform role label.
    pub platform_role: String,
}

/// Request to create a run from a saga spec.
///
/// # Invariants
/// - `run_id` must be unique; duplicates fail with a store conflict.
#[derive(Debug, Clone)]
pub struct CreateRunRequest {
    /// Run identifier chosen by the caller.
    pub run_id: RunId,
    /// Saga spec to materialize, resolved via the spec provider.
    pub saga_id: SagaId,
    /// Optional tenant scope.
    pub tenant_id: Option<TenantId>,
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Free-form run context.
    pub context: Option<Value>,
    /// Caller identity for the access check.
    pub caller: Option<CallerContext>,
}

/// Request to update one step through the state machine.
///
/// # Invariants
/// - `result` and `assertions` replace the stored payloads wholesale.
/// - `failure_code`/`failure_message` are cleared unless provided.
#[derive(Debug, Clone)]
pub struct UpdateStepRequest {
    /// Run identifier.
    pub run_id: RunId,
    /// Step key.
    pub step_key: StepKey,
    /// Requested status.
    pub status: StepStatus,
    /// Structured failure code for failing steps.
    pub failure_code: Option<FailureCode>,
    /// Free-text failure message for failing steps.
    pub failure_message: Option<String>,
    /// Structured result payload.
    pub result: Option<Value>,
    /// Assertion-summary payload.
    pub assertions: Option<Value>,
    /// Caller identity for the access check.
    pub caller: Option<CallerContext>,
}

/// Outcome of a step update: the committed step and the re-aggregated run.
#[derive(Debug, Clone)]
pub struct StepUpdateOutcome {
    /// Step row after the update.
    pub step: SagaRunStep,
    /// Run row after the synchronous aggregator pass.
    pub run: SagaRun,
}

/// Request to create a simulated actor message.
///
/// # Invariants
/// - `message_id` is caller-supplied and unique (idempotency key).
/// - The recipient actor profile must exist for the run.
#[derive(Debug, Clone)]
pub struct CreateMessageRequest {
    /// Message identifier chosen by the caller.
    pub message_id: MessageId,
    /// Run identifier.
    pub run_id: RunId,
    /// Communication channel.
    pub channel: MessageChannel,
    /// Delivery status; defaults to `delivered` when absent.
    pub status: Option<DeliveryStatus>,
    /// Sending actor; `None` means system-generated.
    pub sender: Option<ActorKey>,
    /// Receiving actor.
    pub recipient: ActorKey,
    /// Optional subject line.
    pub subject: Option<String>,
    /// Message body.
    pub body: String,
    /// Caller identity for the access check.
    pub caller: Option<CallerContext>,
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Orchestrator configuration.
///
/// # Invariants
/// - Defaults match the documented staleness threshold (45 minutes).
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfig {
    /// Staleness policy applied on every aggregator pass.
    pub staleness: StalenessPolicy,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Root engine component driving run lifecycles.
///
/// # Invariants
/// - All operations are synchronous and run to completion before returning.
/// - Step writes are never rolled back by later aggregator failures.
pub struct RunOrchestrator<S, L, P> {
    /// Run, step, actor, and coverage persistence.
    store: S,
    /// Append-only evidence ledger.
    ledger: L,
    /// External saga spec provider.
    specs: P,
    /// Lifecycle event bus.
    publisher: Arc<EventPublisher>,
    /// Pluggable failure categorizer for integrity signals.
    classifier: Box<dyn FailureClassifier>,
    /// Access collaborator consulted for external callers.
    access: Box<dyn AccessDecider>,
    /// Operation metrics sink.
    metrics: Box<dyn EngineMetrics>,
    /// Engine configuration.
    config: OrchestratorConfig,
}

impl<S, L, P> RunOrchestrator<S, L, P>
where
    S: RunStore,
    L: ArtifactLedger,
    P: SpecProvider,
{
    /// Creates an orchestrator with the default classifier, an allow-all
    /// access decider, and no metrics sink.
    pub fn new(
        store: S,
        ledger: L,
        specs: P,
        publisher: Arc<EventPublisher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            specs,
            publisher,
            classifier: Box::new(HeuristicFailureClassifier),
            access: Box::new(AllowAllAccess),
            metrics: Box::new(NoopMetrics),
            config,
        }
    }

    /// Replaces the failure classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl FailureClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Replaces the access decider.
    #[must_use]
    pub fn with_access(mut self, access: impl AccessDecider + 'static) -> Self {
        self.access = Box::new(access);
        self
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: impl EngineMetrics + 'static) -> Self {
        self.metrics = Box::new(metrics);
        self
    }

    // ------------------------------------------------------------------
    // Run creation
    // ------------------------------------------------------------------

    /// Creates a run from a saga spec: materializes the run row, one pending
    /// step per spec step in playback order, and one actor profile per
    /// declared actor with deterministic virtual identities.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spec`] for absent or invalid specs and
    /// [`StoreError::Conflict`] (wrapped) for duplicate run ids.
    pub fn create_run(
        &self,
        request: CreateRunRequest,
        now: Timestamp,
    ) -> Result<SagaRun, EngineError> {
        let result = self.create_run_inner(request, now);
        self.record(EngineOperation::CreateRun, &result, |run| run.run_id.clone());
        result
    }

    /// Applies run creation without metrics bookkeeping.
    fn create_run_inner(
        &self,
        request: CreateRunRequest,
        now: Timestamp,
    ) -> Result<SagaRun, EngineError> {
        let spec = self.specs.load(&request.saga_id)?;
        spec.validate().map_err(SpecProviderError::SpecInvalid)?;

        let ordered = spec.ordered_steps();
        let total = u32::try_from(ordered.len()).unwrap_or(u32::MAX);
        let run = SagaRun {
            run_id: request.run_id.clone(),
            saga_id: spec.saga_id.clone(),
            tenant_id: request.tenant_id,
            mode: request.mode,
            status: RunStatus::Pending,
            counters: StepCounters {
                total,
                pending: total,
                ..StepCounters::default()
            },
            context: request.context,
            summary: None,
            created_at: now,
            started_at: None,
            ended_at: None,
            last_heartbeat_at: None,
            archived: false,
        };
        self.authorize(&run, request.caller.as_ref())?;
        self.store.insert_run(&run)?;

        for (phase_order, step_order, step) in ordered {
            self.store.insert_step(&SagaRunStep {
                run_id: run.run_id.clone(),
                step_key: step.step_key.clone(),
                phase_order,
                step_order,
                actor_key: step.actor_key.clone(),
                status: StepStatus::Pending,
                attempts: 0,
                failure_code: None,
                failure_message: None,
                result: None,
                assertions: None,
                started_at: None,
                ended_at: None,
            })?;
        }

        for actor in &spec.actors {
            self.store.insert_profile(&SagaRunActorProfile {
                run_id: run.run_id.clone(),
                actor_key: actor.actor_key.clone(),
                display_name: actor.display_name.clone(),
                role: actor.role.clone(),
                virtual_email: virtual_email(&run.run_id, &actor.actor_key),
                virtual_phone: virtual_phone(&run.run_id, &actor.actor_key),
                real_identity: None,
            })?;
        }

        self.publisher.publish(&RunEvent {
            kind: RunEventKind::RunCreated,
            run_id: run.run_id.clone(),
            step_key: None,
            artifact_id: None,
            run_status: Some(run.status),
            step_status: None,
            at: now,
        });
        Ok(run)
    }

    // ------------------------------------------------------------------
    // Step updates
    // ------------------------------------------------------------------

    /// Updates one step through the state machine and evidence gate, then
    /// runs a synchronous aggregator pass before returning.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`], [`EngineError::InvalidTransition`],
    /// or [`EngineError::EvidenceMissing`] per the taxonomy. A store or
    /// ledger failure after the step write leaves the step committed and the
    /// run summary stale until the next successful pass.
    pub fn update_step(
        &self,
        request: UpdateStepRequest,
        now: Timestamp,
    ) -> Result<StepUpdateOutcome, EngineError> {
        let result = self.update_step_inner(request, now);
        self.record(EngineOperation::UpdateStep, &result, |outcome| outcome.run.run_id.clone());
        result
    }

    /// Applies a step update without metrics bookkeeping.
    fn update_step_inner(
        &self,
        request: UpdateStepRequest,
        now: Timestamp,
    ) -> Result<StepUpdateOutcome, EngineError> {
        let run = self.load_run(&request.run_id)?;
        self.authorize(&run, request.caller.as_ref())?;

        let step = self
            .store
            .load_step(&request.run_id, &request.step_key)?
            .ok_or_else(|| EngineError::NotFound {
                kind: "step",
                id: format!("{}/{}", request.run_id, request.step_key),
            })?;

        if !allowed_transition(step.status, request.status) {
            return Err(EngineError::InvalidTransition {
                run_id: request.run_id,
                step_key: request.step_key,
                from: step.status,
                to: request.status,
            });
        }

        if matches!(request.status, StepStatus::Passed)
            && matches!(
                check_pass_evidence(&self.ledger, &request.run_id, &request.step_key)?,
                GateOutcome::Missing
            )
        {
            return Err(EngineError::EvidenceMissing {
                run_id: request.run_id,
                step_key: request.step_key,
            });
        }

        let mut updated = step.clone();
        updated.status = request.status;
        updated.failure_code = request.failure_code;
        updated.failure_message = request.failure_message;
        updated.result = request.result;
        updated.assertions = request.assertions;
        if matches!(request.status, StepStatus::InProgress) && updated.started_at.is_none() {
            updated.started_at = Some(now);
        }
        if request.status.is_terminal() && updated.ended_at.is_none() {
            updated.ended_at = Some(now);
        }

        if enters_in_progress(step.status, request.status) {
            self.store.increment_attempts(&request.run_id, &request.step_key)?;
        }
        self.store.save_step(&updated)?;

        // The step is committed from here on; aggregator failures propagate
        // without rolling it back.
        let refreshed = self.aggregate(&run, RefreshOptions::active(), now)?;

        let committed = self
            .store
            .load_step(&request.run_id, &request.step_key)?
            .unwrap_or(updated);
        self.publisher.publish(&RunEvent {
            kind: RunEventKind::StepUpdated,
            run_id: request.run_id.clone(),
            step_key: Some(request.step_key.clone()),
            artifact_id: None,
            run_status: Some(refreshed.status),
            step_status: Some(committed.status),
            at: now,
        });

        Ok(StepUpdateOutcome {
            step: committed,
            run: refreshed,
        })
    }

    // ------------------------------------------------------------------
    // Artifacts
    // ------------------------------------------------------------------

    /// Appends an evidence artifact, anchored to a step when provided.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the run or anchoring step is
    /// absent, or a ledger error when the append fails.
    pub fn save_artifact(
        &self,
        artifact: NewArtifact,
        caller: Option<CallerContext>,
        now: Timestamp,
    ) -> Result<SagaRunArtifact, EngineError> {
        let result = self.save_artifact_inner(artifact, caller, now);
        self.record(EngineOperation::SaveArtifact, &result, |record| record.run_id.clone());
        result
    }

    /// Applies an artifact append without metrics bookkeeping.
    fn save_artifact_inner(
        &self,
        artifact: NewArtifact,
        caller: Option<CallerContext>,
        now: Timestamp,
    ) -> Result<SagaRunArtifact, EngineError> {
        let run = self.load_run(&artifact.run_id)?;
        self.authorize(&run, caller.as_ref())?;
        if let Some(step_key) = &artifact.step_key
            && self.store.load_step(&artifact.run_id, step_key)?.is_none()
        {
            return Err(EngineError::NotFound {
                kind: "step",
                id: format!("{}/{step_key}", artifact.run_id),
            });
        }

        let record = self.ledger.append(artifact, now)?;
        self.publisher.publish(&RunEvent {
            kind: RunEventKind::ArtifactCreated,
            run_id: record.run_id.clone(),
            step_key: record.step_key.clone(),
            artifact_id: Some(record.artifact_id.clone()),
            run_status: None,
            step_status: None,
            at: now,
        });
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Refresh, cancel, archive
    // ------------------------------------------------------------------

    /// Runs an on-demand aggregator pass (health checks, dashboards).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for absent runs or a store/ledger
    /// error when the pass fails.
    pub fn refresh_run_status(
        &self,
        run_id: &RunId,
        options: RefreshOptions,
        caller: Option<CallerContext>,
        now: Timestamp,
    ) -> Result<SagaRun, EngineError> {
        let result = self.refresh_inner(run_id, options, caller, now);
        self.record(EngineOperation::RefreshRun, &result, |run| run.run_id.clone());
        result
    }

    /// Applies an on-demand refresh without metrics bookkeeping.
    fn refresh_inner(
        &self,
        run_id: &RunId,
        options: RefreshOptions,
        caller: Option<CallerContext>,
        now: Timestamp,
    ) -> Result<SagaRun, EngineError> {
        let run = self.load_run(run_id)?;
        self.authorize(&run, caller.as_ref())?;
        self.aggregate(&run, options, now)
    }

    /// Cancels a non-terminal run. Cancellation is terminal and sticks
    /// through all later aggregator passes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] (wrapped) when the run already
    /// reached `passed` or `failed`; re-cancelling is idempotent.
    pub fn cancel_run(
        &self,
        run_id: &RunId,
        caller: Option<CallerContext>,
        now: Timestamp,
    ) -> Result<SagaRun, EngineError> {
        let result = self.cancel_inner(run_id, caller, now);
        self.record(EngineOperation::CancelRun, &result, |run| run.run_id.clone());
        result
    }

    /// Applies cancellation without metrics bookkeeping.
    fn cancel_inner(
        &self,
        run_id: &RunId,
        caller: Option<CallerContext>,
        now: Timestamp,
    ) -> Result<SagaRun, EngineError> {
        let mut run = self.load_run(run_id)?;
        self.authorize(&run, caller.as_ref())?;
        if matches!(run.status, RunStatus::Cancelled) {
            return Ok(run);
        }
        if run.status.is_terminal() {
            return Err(EngineError::Store(StoreError::Invalid(format!(
                "run {run_id} is already terminal ({})",
                run.status
            ))));
        }
        run.status = RunStatus::Cancelled;
        if run.ended_at.is_none() {
            run.ended_at = Some(now);
        }
        self.store.save_run(&run)?;
        self.publisher.publish(&RunEvent {
            kind: RunEventKind::RunCompleted,
            run_id: run.run_id.clone(),
            step_key: None,
            artifact_id: None,
            run_status: Some(run.status),
            step_status: None,
            at: now,
        });
        Ok(run)
    }

    /// Archives a terminal run. Re-archiving is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] (wrapped) for non-terminal runs.
    pub fn archive_run(
        &self,
        run_id: &RunId,
        caller: Option<CallerContext>,
        now: Timestamp,
    ) -> Result<SagaRun, EngineError> {
        let result = self.archive_inner(run_id, caller, now);
        self.record(EngineOperation::ArchiveRun, &result, |run| run.run_id.clone());
        result
    }

    /// Applies archival without metrics bookkeeping.
    fn archive_inner(
        &self,
        run_id: &RunId,
        caller: Option<CallerContext>,
        now: Timestamp,
    ) -> Result<SagaRun, EngineError> {
        let mut run = self.load_run(run_id)?;
        self.authorize(&run, caller.as_ref())?;
        if run.archived {
            return Ok(run);
        }
        if !run.status.is_terminal() {
            return Err(EngineError::Store(StoreError::Invalid(format!(
                "run {run_id} is not terminal ({})",
                run.status
            ))));
        }
        run.archived = true;
        self.store.save_run(&run)?;
        self.publisher.publish(&RunEvent {
            kind: RunEventKind::RunArchived,
            run_id: run.run_id.clone(),
            step_key: None,
            artifact_id: None,
            run_status: Some(run.status),
            step_status: None,
            at: now,
        });
        Ok(run)
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Creates a simulated actor message with status-derived lifecycle
    /// timestamps. Messages are immutable once created.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the run or a referenced actor
    /// profile is absent.
    pub fn create_message(
        &self,
        request: CreateMessageRequest,
        now: Timestamp,
    ) -> Result<SagaRunActorMessage, EngineError> {
        let result = self.create_message_inner(request, now);
        self.record(EngineOperation::CreateMessage, &result, |message| message.run_id.clone());
        result
    }

    /// Applies message creation without metrics bookkeeping.
    fn create_message_inner(
        &self,
        request: CreateMessageRequest,
        now: Timestamp,
    ) -> Result<SagaRunActorMessage, EngineError> {
        let run = self.load_run(&request.run_id)?;
        self.authorize(&run, request.caller.as_ref())?;

        if self.store.load_profile(&request.run_id, &request.recipient)?.is_none() {
            return Err(EngineError::NotFound {
                kind: "actor profile",
                id: format!("{}/{}", request.run_id, request.recipient),
            });
        }
        if let Some(sender) = &request.sender
            && self.store.load_profile(&request.run_id, sender)?.is_none()
        {
            return Err(EngineError::NotFound {
                kind: "actor profile",
                id: format!("{}/{sender}", request.run_id),
            });
        }

        let status = request.status.unwrap_or(DeliveryStatus::Delivered);
        let (sent_at, delivered_at, read_at, failed_at) =
            SagaRunActorMessage::lifecycle_for(status, now);
        let message = SagaRunActorMessage {
            message_id: request.message_id,
            run_id: request.run_id,
            channel: request.channel,
            status,
            sender: request.sender,
            recipient: request.recipient,
            subject: request.subject,
            body: request.body,
            queued_at: now,
            sent_at,
            delivered_at,
            read_at,
            failed_at,
        };
        self.store.insert_message(&message)?;
        Ok(message)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Loads a run by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the run is absent.
    pub fn run(&self, run_id: &RunId) -> Result<SagaRun, EngineError> {
        self.load_run(run_id)
    }

    /// Lists a run's steps in playback order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the run is absent.
    pub fn steps(&self, run_id: &RunId) -> Result<Vec<SagaRunStep>, EngineError> {
        self.load_run(run_id)?;
        Ok(self.store.list_steps(run_id)?)
    }

    /// Loads the latest coverage report for a run, if a pass has produced one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the run is absent.
    pub fn coverage(&self, run_id: &RunId) -> Result<Option<CoverageReport>, EngineError> {
        self.load_run(run_id)?;
        Ok(self.store.load_coverage(run_id)?)
    }

    /// Lists a run's actor profiles.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the run is absent.
    pub fn profiles(&self, run_id: &RunId) -> Result<Vec<SagaRunActorProfile>, EngineError> {
        self.load_run(run_id)?;
        Ok(self.store.list_profiles(run_id)?)
    }

    /// Lists a run's simulated messages in append order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the run is absent.
    pub fn messages(&self, run_id: &RunId) -> Result<Vec<SagaRunActorMessage>, EngineError> {
        self.load_run(run_id)?;
        Ok(self.store.list_messages(run_id)?)
    }

    /// Lists a run's artifacts in append order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the run is absent.
    pub fn artifacts(&self, run_id: &RunId) -> Result<Vec<SagaRunArtifact>, EngineError> {
        self.load_run(run_id)?;
        Ok(self.ledger.list_by_run(run_id)?)
    }

    /// Returns the event publisher for subscriber registration.
    #[must_use]
    pub fn publisher(&self) -> &Arc<EventPublisher> {
        &self.publisher
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Loads a run or fails with `NotFound`.
    fn load_run(&self, run_id: &RunId) -> Result<SagaRun, EngineError> {
        self.store.load_run(run_id)?.ok_or_else(|| EngineError::NotFound {
            kind: "run",
            id: run_id.to_string(),
        })
    }

    /// Consults the access collaborator for external callers; absent caller
    /// context means a trusted internal invocation.
    fn authorize(&self, run: &SagaRun, caller: Option<&CallerContext>) -> Result<(), EngineError> {
        let Some(caller) = caller else {
            return Ok(());
        };
        let decision = self.access.authorize(&AccessRequest {
            user_id: &caller.user_id,
            platform_role: &caller.platform_role,
            run_id: &run.run_id,
            tenant_id: run.tenant_id,
        });
        if decision.allowed {
            Ok(())
        } else {
            Err(EngineError::Forbidden {
                reason: decision.reason,
            })
        }
    }

    /// Runs one aggregator pass and persists its outcome: saves the run,
    /// atomically replaces the coverage report, and publishes the pass event
    /// unless suppressed.
    fn aggregate(
        &self,
        run: &SagaRun,
        options: RefreshOptions,
        now: Timestamp,
    ) -> Result<SagaRun, EngineError> {
        let spec = self.specs.load(&run.saga_id)?;
        let steps = self.store.list_steps(&run.run_id)?;
        let outcome = refresh_run(
            run,
            &steps,
            &spec,
            &self.ledger,
            self.classifier.as_ref(),
            self.config.staleness,
            options,
            now,
        )?;
        self.store.save_run(&outcome.run)?;
        self.store.replace_coverage(&outcome.report)?;
        if let Some(event) = &outcome.event {
            self.publisher.publish(event);
        }
        Ok(outcome.run)
    }

    /// Records one completed operation in the metrics sink.
    fn record<T, E>(
        &self,
        operation: EngineOperation,
        result: &Result<T, E>,
        run_id_of: impl Fn(&T) -> RunId,
    ) {
        self.metrics.record_operation(EngineMetricEvent {
            operation,
            ok: result.is_ok(),
            run_id: result.as_ref().ok().map(run_id_of),
        });
    }
}
