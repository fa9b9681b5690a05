// crates/saga-run-core/tests/aggregator.rs
// ============================================================================
// Module: Aggregator Tests
// Description: Validate status derivation, staleness, and summary assembly.
// Purpose: Ensure aggregator passes derive run state by the fixed priority.
// Dependencies: saga-run-core, serde_json
// ============================================================================

//! Aggregator pass tests over synthetic run and step rows.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use saga_run_core::ActorKey;
use saga_run_core::ActorSpec;
use saga_run_core::ArtifactBody;
use saga_run_core::ArtifactKind;
use saga_run_core::EvidenceKind;
use saga_run_core::ExecutionMode;
use saga_run_core::HeuristicFailureClassifier;
use saga_run_core::InMemoryArtifactLedger;
use saga_run_core::NewArtifact;
use saga_run_core::PhaseSpec;
use saga_run_core::RefreshOptions;
use saga_run_core::RunEventKind;
use saga_run_core::RunId;
use saga_run_core::RunStatus;
use saga_run_core::SagaId;
use saga_run_core::SagaRun;
use saga_run_core::SagaRunStep;
use saga_run_core::SagaSpec;
use saga_run_core::StalenessPolicy;
use saga_run_core::StepCounters;
use saga_run_core::StepKey;
use saga_run_core::StepSpec;
use saga_run_core::StepStatus;
use saga_run_core::Timestamp;
use saga_run_core::interfaces::ArtifactLedger;
use saga_run_core::runtime::MAX_SUMMARY_ENTRIES;
use saga_run_core::runtime::refresh_run;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const MINUTE_MILLIS: i64 = 60 * 1_000;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn spec(step_keys: &[&str]) -> SagaSpec {
    SagaSpec {
        saga_id: SagaId::new("saga-1"),
        title: "Synthetic saga".to_string(),
        requirements: Vec::new(),
        actors: vec![ActorSpec {
            actor_key: ActorKey::new("actor"),
            display_name: "Actor".to_string(),
            role: "tester".to_string(),
        }],
        phases: vec![PhaseSpec {
            phase_key: "phase".to_string(),
            order: 1,
            title: "Phase".to_string(),
            steps: step_keys
                .iter()
                .enumerate()
                .map(|(index, key)| StepSpec {
                    step_key: StepKey::new(*key),
                    order: u32::try_from(index).unwrap() + 1,
                    actor_key: ActorKey::new("actor"),
                    instruction: format!("do {key}"),
                    expected_result: "ok".to_string(),
                    delay: None,
                    evidence_required: vec![EvidenceKind::ApiTrace],
                })
                .collect(),
        }],
    }
}

fn run(status: RunStatus) -> SagaRun {
    SagaRun {
        run_id: RunId::new("run-1"),
        saga_id: SagaId::new("saga-1"),
        tenant_id: None,
        mode: ExecutionMode::DryRun,
        status,
        counters: StepCounters::default(),
        context: None,
        summary: None,
        created_at: ts(0),
        started_at: None,
        ended_at: None,
        last_heartbeat_at: None,
        archived: false,
    }
}

fn step(step_key: &str, order: u32, status: StepStatus) -> SagaRunStep {
    SagaRunStep {
        run_id: RunId::new("run-1"),
        step_key: StepKey::new(step_key),
        phase_order: 1,
        step_order: order,
        actor_key: ActorKey::new("actor"),
        status,
        attempts: 0,
        failure_code: None,
        failure_message: None,
        result: None,
        assertions: None,
        started_at: None,
        ended_at: None,
    }
}

fn trace(ledger: &InMemoryArtifactLedger, step_key: &str) {
    ledger
        .append(
            NewArtifact {
                run_id: RunId::new("run-1"),
                step_key: Some(StepKey::new(step_key)),
                kind: ArtifactKind::ApiTrace,
                title: format!("trace for {step_key}"),
                locator: format!("mem://{step_key}"),
                content_type: "application/json".to_string(),
                body: ArtifactBody::Json(json!({"status": 200})),
            },
            ts(500),
        )
        .expect("append trace");
}

fn refresh(
    run: &SagaRun,
    steps: &[SagaRunStep],
    spec: &SagaSpec,
    ledger: &InMemoryArtifactLedger,
    policy: StalenessPolicy,
    options: RefreshOptions,
    now: Timestamp,
) -> saga_run_core::AggregateOutcome {
    refresh_run(
        run,
        steps,
        spec,
        ledger,
        &HeuristicFailureClassifier,
        policy,
        options,
        now,
    )
    .expect("aggregator pass")
}

// ============================================================================
// SECTION: Status Derivation
// ============================================================================

#[test]
fn all_pending_stays_pending() {
    let spec = spec(&["a", "b"]);
    let ledger = InMemoryArtifactLedger::new();
    let steps = vec![step("a", 1, StepStatus::Pending), step("b", 2, StepStatus::Pending)];
    let outcome = refresh(
        &run(RunStatus::Pending),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::active(),
        ts(1_000),
    );
    assert_eq!(outcome.run.status, RunStatus::Pending);
    assert_eq!(outcome.run.counters.pending, 2);
    assert!(outcome.run.started_at.is_none());
}

#[test]
fn in_progress_work_means_running() {
    let spec = spec(&["a", "b"]);
    let ledger = InMemoryArtifactLedger::new();
    let steps = vec![step("a", 1, StepStatus::InProgress), step("b", 2, StepStatus::Pending)];
    let outcome = refresh(
        &run(RunStatus::Pending),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::active(),
        ts(1_000),
    );
    assert_eq!(outcome.run.status, RunStatus::Running);
    assert_eq!(outcome.run.started_at, Some(ts(1_000)));
    assert_eq!(outcome.run.last_heartbeat_at, Some(ts(1_000)));
}

#[test]
fn any_failure_fails_the_run() {
    let spec = spec(&["a", "b"]);
    let ledger = InMemoryArtifactLedger::new();
    trace(&ledger, "a");
    let mut failed = step("b", 2, StepStatus::Failed);
    failed.failure_message = Some("boom".to_string());
    let steps = vec![step("a", 1, StepStatus::Passed), failed];
    let outcome = refresh(
        &run(RunStatus::Running),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::active(),
        ts(2_000),
    );
    assert_eq!(outcome.run.status, RunStatus::Failed);
    assert_eq!(outcome.run.ended_at, Some(ts(2_000)));
    let summary = outcome.run.summary.expect("summary");
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].step_key.as_str(), "b");
}

#[test]
fn missing_advisory_evidence_fails_a_finished_run() {
    // Both steps claim success but only one has its trace: the run cannot
    // reach passed with an evidence hole.
    let spec = spec(&["a", "b"]);
    let ledger = InMemoryArtifactLedger::new();
    trace(&ledger, "a");
    let steps = vec![step("a", 1, StepStatus::Passed), step("b", 2, StepStatus::Passed)];
    let outcome = refresh(
        &run(RunStatus::Running),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::active(),
        ts(2_000),
    );
    assert_eq!(outcome.run.status, RunStatus::Failed);
    let summary = outcome.run.summary.expect("summary");
    assert_eq!(summary.missing_evidence.len(), 1);
    assert_eq!(summary.missing_evidence[0].step_key.as_str(), "b");
}

#[test]
fn fully_evidenced_completion_passes() {
    let spec = spec(&["a", "b"]);
    let ledger = InMemoryArtifactLedger::new();
    trace(&ledger, "a");
    trace(&ledger, "b");
    let steps = vec![step("a", 1, StepStatus::Passed), step("b", 2, StepStatus::Skipped)];
    let outcome = refresh(
        &run(RunStatus::Running),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::active(),
        ts(2_000),
    );
    assert_eq!(outcome.run.status, RunStatus::Passed);
    assert_eq!(outcome.run.counters.skipped, 1);
    let event = outcome.event.expect("event");
    assert_eq!(event.kind, RunEventKind::RunCompleted);
}

#[test]
fn cancellation_wins_over_everything() {
    let spec = spec(&["a"]);
    let ledger = InMemoryArtifactLedger::new();
    trace(&ledger, "a");
    let steps = vec![step("a", 1, StepStatus::Passed)];
    let outcome = refresh(
        &run(RunStatus::Cancelled),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::active(),
        ts(2_000),
    );
    assert_eq!(outcome.run.status, RunStatus::Cancelled);
}

// ============================================================================
// SECTION: Staleness
// ============================================================================

#[test]
fn idle_pending_run_is_auto_closed_past_threshold() {
    let spec = spec(&["a", "b"]);
    let ledger = InMemoryArtifactLedger::new();
    let steps = vec![step("a", 1, StepStatus::Pending), step("b", 2, StepStatus::Pending)];
    let outcome = refresh(
        &run(RunStatus::Pending),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::passive(),
        ts(46 * MINUTE_MILLIS),
    );
    assert_eq!(outcome.run.status, RunStatus::Failed);
    let summary = outcome.run.summary.expect("summary");
    let auto_closed = summary.auto_closed.expect("auto close marker");
    assert_eq!(auto_closed.threshold_millis, 45 * 60 * 1_000);
    // Passive passes never touch the heartbeat or emit events.
    assert!(outcome.run.last_heartbeat_at.is_none());
    assert!(outcome.event.is_none());
}

#[test]
fn heartbeat_defers_staleness() {
    let spec = spec(&["a"]);
    let ledger = InMemoryArtifactLedger::new();
    let mut idle = run(RunStatus::Pending);
    idle.last_heartbeat_at = Some(ts(44 * MINUTE_MILLIS));
    let steps = vec![step("a", 1, StepStatus::Pending)];
    let outcome = refresh(
        &idle,
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::passive(),
        ts(46 * MINUTE_MILLIS),
    );
    assert_eq!(outcome.run.status, RunStatus::Pending);
    assert!(outcome.run.summary.expect("summary").auto_closed.is_none());
}

#[test]
fn in_progress_work_is_never_stale() {
    let spec = spec(&["a"]);
    let ledger = InMemoryArtifactLedger::new();
    let steps = vec![step("a", 1, StepStatus::InProgress)];
    let outcome = refresh(
        &run(RunStatus::Running),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::passive(),
        ts(300 * MINUTE_MILLIS),
    );
    assert_eq!(outcome.run.status, RunStatus::Running);
}

#[test]
fn zero_threshold_disables_the_monitor() {
    let spec = spec(&["a"]);
    let ledger = InMemoryArtifactLedger::new();
    let steps = vec![step("a", 1, StepStatus::Pending)];
    let outcome = refresh(
        &run(RunStatus::Pending),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy { threshold_millis: 0 },
        RefreshOptions::passive(),
        ts(300 * MINUTE_MILLIS),
    );
    assert_eq!(outcome.run.status, RunStatus::Pending);
}

// ============================================================================
// SECTION: Summary Assembly
// ============================================================================

#[test]
fn summary_truncates_to_one_hundred_failures() {
    let keys: Vec<String> = (0 .. 150).map(|index| format!("step-{index:03}")).collect();
    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let spec = spec(&key_refs);
    let ledger = InMemoryArtifactLedger::new();
    let steps: Vec<SagaRunStep> = keys
        .iter()
        .enumerate()
        .map(|(index, key)| {
            let mut row = step(key, u32::try_from(index).unwrap() + 1, StepStatus::Failed);
            row.failure_message = Some("boom".to_string());
            row
        })
        .collect();
    let outcome = refresh(
        &run(RunStatus::Running),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::active(),
        ts(2_000),
    );
    let summary = outcome.run.summary.expect("summary");
    assert_eq!(summary.failures.len(), MAX_SUMMARY_ENTRIES);
    assert_eq!(summary.counters.failed, 150);
}

#[test]
fn repeated_passes_converge() {
    // A second pass over the outcome of an auto-close pass must keep the
    // run failed and preserve the auto-close marker.
    let spec = spec(&["a"]);
    let ledger = InMemoryArtifactLedger::new();
    let steps = vec![step("a", 1, StepStatus::Pending)];
    let first = refresh(
        &run(RunStatus::Pending),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::passive(),
        ts(46 * MINUTE_MILLIS),
    );
    assert_eq!(first.run.status, RunStatus::Failed);

    let second = refresh(
        &first.run,
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::passive(),
        ts(47 * MINUTE_MILLIS),
    );
    assert_eq!(second.run.status, RunStatus::Failed);
    assert_eq!(second.run.ended_at, first.run.ended_at);
    let summary = second.run.summary.expect("summary");
    assert!(summary.auto_closed.is_some());
}

#[test]
fn report_carries_run_step_and_requirement_items() {
    let mut spec = spec(&["a", "b"]);
    spec.requirements = vec![saga_run_core::RequirementId::new("req-1")];
    let ledger = InMemoryArtifactLedger::new();
    trace(&ledger, "a");
    let mut failed = step("b", 2, StepStatus::Failed);
    failed.failure_message = Some("boom".to_string());
    let steps = vec![step("a", 1, StepStatus::Passed), failed];
    let outcome = refresh(
        &run(RunStatus::Running),
        &steps,
        &spec,
        &ledger,
        StalenessPolicy::default(),
        RefreshOptions::active(),
        ts(2_000),
    );
    assert_eq!(outcome.report.completion_pct, 50);
    assert_eq!(outcome.report.items.len(), 3);
    assert_eq!(outcome.report.run_id.as_str(), "run-1");
}
