// crates/saga-run-core/src/runtime/aggregate.rs
// ============================================================================
// Module: Run Status Aggregator
// Description: Counter recompute, staleness policy, and status derivation.
// Purpose: Derive run-level state and the coverage report from step rows.
// Dependencies: crate::core, crate::interfaces, crate::runtime::gate
// ============================================================================

//! ## Overview
//! The aggregator runs after every step mutation and on demand. It always
//! recomputes from the full current step set rather than applying deltas, so
//! concurrent passes for one run converge regardless of ordering. A pass
//! recomputes counters, extracts integrity signals through the pluggable
//! failure classifier, applies the staleness policy, derives the run status
//! by fixed priority, writes the run summary, and assembles the
//! replace-on-write coverage report.
//!
//! Heartbeat refresh and event emission are caller-controlled so passive
//! dashboard refreshes neither keep a dead run alive nor trigger event
//! storms.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::AutoClose;
use crate::core::Classification;
use crate::core::CoverageItem;
use crate::core::CoverageReport;
use crate::core::CoverageSubject;
use crate::core::CoverageVerdict;
use crate::core::FailureClassifier;
use crate::core::FailureKind;
use crate::core::IntegritySignals;
use crate::core::RunEvent;
use crate::core::RunEventKind;
use crate::core::RunStatus;
use crate::core::RunSummary;
use crate::core::SagaRun;
use crate::core::SagaRunStep;
use crate::core::SagaSpec;
use crate::core::StepCounters;
use crate::core::StepFailure;
use crate::core::StepStatus;
use crate::core::Timestamp;
use crate::core::coverage::classification;
use crate::core::coverage::completion_pct;
use crate::core::coverage::locus_axis;
use crate::core::coverage::verdict;
use crate::core::coverage::workaround_axis;
use crate::interfaces::ArtifactLedger;
use crate::interfaces::LedgerError;
use crate::runtime::gate::missing_evidence_for_step;

// ============================================================================
// SECTION: Policy & Options
// ============================================================================

/// Default staleness threshold: 45 minutes.
pub const DEFAULT_STALE_THRESHOLD_MILLIS: u64 = 45 * 60 * 1_000;
/// Maximum failure and missing-evidence entries kept in a run summary.
pub const MAX_SUMMARY_ENTRIES: usize = 100;

/// Staleness policy evaluated inside each aggregator pass.
///
/// # Invariants
/// - A threshold of zero disables the check entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Inactivity threshold in milliseconds; zero disables.
    pub threshold_millis: u64,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            threshold_millis: DEFAULT_STALE_THRESHOLD_MILLIS,
        }
    }
}

/// Caller-controlled refresh behavior.
///
/// # Invariants
/// - Passive refreshes must suppress both heartbeat and events to avoid
///   perpetual liveness and refresh-triggered event loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Refresh `last_heartbeat_at` to the pass timestamp.
    pub touch_heartbeat: bool,
    /// Emit a `run.updated` / `run.completed` event for this pass.
    pub emit_events: bool,
}

impl RefreshOptions {
    /// Options for an active caller-driven mutation.
    #[must_use]
    pub const fn active() -> Self {
        Self {
            touch_heartbeat: true,
            emit_events: true,
        }
    }

    /// Options for a passive, read-only refresh.
    #[must_use]
    pub const fn passive() -> Self {
        Self {
            touch_heartbeat: false,
            emit_events: false,
        }
    }
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self::active()
    }
}

/// Result of one aggregator pass.
///
/// # Invariants
/// - `run` carries the derived status, counters, and summary.
/// - `event` is `None` when emission was suppressed by the caller.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    /// Updated run row.
    pub run: SagaRun,
    /// Replace-on-write coverage report for this pass.
    pub report: CoverageReport,
    /// Lifecycle event to publish, unless suppressed.
    pub event: Option<RunEvent>,
}

// ============================================================================
// SECTION: Aggregator Pass
// ============================================================================

/// Runs one aggregator pass over the full current step set.
///
/// # Errors
///
/// Returns [`LedgerError`] when advisory evidence lookups fail; the pass has
/// no other failure mode and performs no writes itself.
pub fn refresh_run(
    run: &SagaRun,
    steps: &[SagaRunStep],
    spec: &SagaSpec,
    ledger: &dyn ArtifactLedger,
    classifier: &dyn FailureClassifier,
    policy: StalenessPolicy,
    options: RefreshOptions,
    now: Timestamp,
) -> Result<AggregateOutcome, LedgerError> {
    let counters = recompute_counters(steps);
    let signals = extract_signals(steps, spec, ledger, classifier)?;

    let stale = is_stale(run, &counters, policy, now);
    let status = derive_status(run.status, &counters, &signals, stale);

    let pct = completion_pct(counters.passed, counters.total);
    let class = classification(counters.passed, counters.total, signals.step_failures.len());
    let run_verdict = verdict(class, pct, signals.step_failures.len());
    let workaround = workaround_axis(signals.not_implemented_steps, run_verdict);
    let locus = locus_axis(signals.not_implemented_steps, signals.api_failure_steps, run_verdict);

    let auto_closed = if stale && !matches!(run.status, RunStatus::Cancelled) {
        Some(AutoClose {
            reason: format!(
                "auto-closed: no progress since {}",
                staleness_base(run).to_rfc3339()
            ),
            threshold_millis: policy.threshold_millis,
        })
    } else {
        run.summary.as_ref().and_then(|summary| summary.auto_closed.clone())
    };

    let mut updated = run.clone();
    updated.status = status;
    updated.counters = counters;
    if matches!(status, RunStatus::Running) && updated.started_at.is_none() {
        updated.started_at = Some(now);
    }
    if status.is_terminal() && updated.ended_at.is_none() {
        updated.ended_at = Some(now);
    }
    if options.touch_heartbeat {
        updated.last_heartbeat_at = Some(now);
    }
    updated.summary = Some(RunSummary {
        classification: class,
        verdict: run_verdict,
        workaround,
        locus,
        completion_pct: pct,
        counters,
        failures: truncated(&signals.step_failures),
        missing_evidence: truncated(&signals.missing_evidence),
        auto_closed,
        refreshed_at: now,
    });

    let report = build_report(&updated, spec, &signals, class, run_verdict, now);

    let event = options.emit_events.then(|| RunEvent {
        kind: if status.is_terminal() {
            RunEventKind::RunCompleted
        } else {
            RunEventKind::RunUpdated
        },
        run_id: updated.run_id.clone(),
        step_key: None,
        artifact_id: None,
        run_status: Some(status),
        step_status: None,
        at: now,
    });

    Ok(AggregateOutcome {
        run: updated,
        report,
        event,
    })
}

// ============================================================================
// SECTION: Counters & Signals
// ============================================================================

/// Recomputes all step counters from the full step set.
#[must_use]
pub fn recompute_counters(steps: &[SagaRunStep]) -> StepCounters {
    let mut counters = StepCounters {
        total: u32::try_from(steps.len()).unwrap_or(u32::MAX),
        ..StepCounters::default()
    };
    for step in steps {
        match step.status {
            StepStatus::Pending => counters.pending += 1,
            StepStatus::InProgress => counters.in_progress += 1,
            StepStatus::Passed => counters.passed += 1,
            StepStatus::Failed => counters.failed += 1,
            StepStatus::Skipped => counters.skipped += 1,
            StepStatus::Blocked => counters.blocked += 1,
        }
    }
    counters
}

/// Extracts integrity signals: failures, advisory missing evidence, and
/// semantic failure-category counts.
///
/// Advisory completeness is evaluated only for passed steps — a step that has
/// not yet claimed success cannot be missing evidence.
fn extract_signals(
    steps: &[SagaRunStep],
    spec: &SagaSpec,
    ledger: &dyn ArtifactLedger,
    classifier: &dyn FailureClassifier,
) -> Result<IntegritySignals, LedgerError> {
    let mut signals = IntegritySignals::default();
    for step in steps {
        match step.status {
            StepStatus::Failed | StepStatus::Blocked => {
                match classifier
                    .categorize(step.failure_code.as_ref(), step.failure_message.as_deref())
                {
                    FailureKind::NotImplemented => signals.not_implemented_steps += 1,
                    FailureKind::ApiFailure => signals.api_failure_steps += 1,
                    FailureKind::Other => {}
                }
                signals.step_failures.push(StepFailure {
                    step_key: step.step_key.clone(),
                    code: step.failure_code.clone(),
                    message: step.failure_message.clone(),
                });
            }
            StepStatus::Passed => {
                if let Some(step_spec) = spec.step(&step.step_key)
                    && let Some(missing) =
                        missing_evidence_for_step(ledger, &step.run_id, step_spec)?
                {
                    signals.missing_evidence.push(missing);
                }
            }
            StepStatus::Pending | StepStatus::InProgress | StepStatus::Skipped => {}
        }
    }
    Ok(signals)
}

// ============================================================================
// SECTION: Staleness & Derivation
// ============================================================================

/// Returns the instant staleness is measured against: the latest liveness
/// signal, falling back to run creation for runs that never started.
fn staleness_base(run: &SagaRun) -> Timestamp {
    let mut base = run.created_at;
    if let Some(started) = run.started_at
        && started > base
    {
        base = started;
    }
    if let Some(heartbeat) = run.last_heartbeat_at
        && heartbeat > base
    {
        base = heartbeat;
    }
    base
}

/// Evaluates the staleness policy for this pass. The check is structural
/// (no in-progress work, pending steps remain, idle past the threshold), so
/// an auto-closed run re-derives as failed on every later pass.
fn is_stale(
    run: &SagaRun,
    counters: &StepCounters,
    policy: StalenessPolicy,
    now: Timestamp,
) -> bool {
    if policy.threshold_millis == 0 {
        return false;
    }
    if counters.in_progress != 0 || counters.pending == 0 {
        return false;
    }
    let idle = now.millis_since(staleness_base(run));
    idle > 0 && u64::try_from(idle).unwrap_or(0) > policy.threshold_millis
}

/// Derives the run status by fixed priority.
fn derive_status(
    previous: RunStatus,
    counters: &StepCounters,
    signals: &IntegritySignals,
    stale: bool,
) -> RunStatus {
    if matches!(previous, RunStatus::Cancelled) {
        return RunStatus::Cancelled;
    }
    if stale {
        return RunStatus::Failed;
    }
    if counters.failed > 0 || counters.blocked > 0 || !signals.missing_evidence.is_empty() {
        return RunStatus::Failed;
    }
    if counters.pending == counters.total {
        return RunStatus::Pending;
    }
    if counters.pending == 0 && counters.in_progress == 0 {
        return RunStatus::Passed;
    }
    RunStatus::Running
}

/// Clones at most the first 100 entries of a summary list.
fn truncated<T: Clone>(entries: &[T]) -> Vec<T> {
    entries.iter().take(MAX_SUMMARY_ENTRIES).cloned().collect()
}

// ============================================================================
// SECTION: Report Assembly
// ============================================================================

/// Builds the replace-on-write coverage report for this pass: one item for
/// the run, one per failing or blocked step (always gap), and one per
/// requirement linked to the saga spec.
fn build_report(
    run: &SagaRun,
    spec: &SagaSpec,
    signals: &IntegritySignals,
    class: Classification,
    run_verdict: CoverageVerdict,
    now: Timestamp,
) -> CoverageReport {
    let workaround = workaround_axis(signals.not_implemented_steps, run_verdict);
    let locus = locus_axis(signals.not_implemented_steps, signals.api_failure_steps, run_verdict);
    let pct = completion_pct(run.counters.passed, run.counters.total);

    let mut items = Vec::with_capacity(1 + signals.step_failures.len() + spec.requirements.len());
    items.push(CoverageItem {
        subject: CoverageSubject::Run,
        classification: class,
        verdict: run_verdict,
        workaround,
        locus,
        note: format!(
            "{} of {} steps passed ({pct}%)",
            run.counters.passed, run.counters.total
        ),
    });
    for failure in &signals.step_failures {
        items.push(CoverageItem {
            subject: CoverageSubject::Step {
                step_key: failure.step_key.clone(),
            },
            classification: Classification::Gap,
            verdict: CoverageVerdict::Gap,
            workaround,
            locus,
            note: failure
                .message
                .clone()
                .unwrap_or_else(|| "step failed without a message".to_string()),
        });
    }
    for requirement in &spec.requirements {
        items.push(CoverageItem {
            subject: CoverageSubject::Requirement {
                requirement_id: requirement.clone(),
            },
            classification: class,
            verdict: run_verdict,
            workaround,
            locus,
            note: format!("inherited from run {}", run.run_id),
        });
    }

    CoverageReport {
        run_id: run.run_id.clone(),
        saga_id: run.saga_id.clone(),
        classification: class,
        verdict: run_verdict,
        workaround,
        locus,
        completion_pct: pct,
        generated_at: now,
        items,
    }
}
