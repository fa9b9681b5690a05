// system-tests/tests/end_to_end.rs
// ============================================================================
// Module: End-to-End Engine Scenarios
// Description: Drive full run lifecycles through the orchestrator.
// Purpose: Validate creation, gating, aggregation, and closure end to end.
// Dependencies: system-tests, saga-run-core
// ============================================================================

//! ## Overview
//! End-to-end scenarios over the in-memory backends: a run is created from
//! the checkout saga, stepped through the state machine with evidence-gated
//! passes, failed by an API error, and summarized by the aggregator.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    reason = "Test-only panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use saga_run_core::CoverageSubject;
use saga_run_core::CreateRunRequest;
use saga_run_core::EngineError;
use saga_run_core::ExecutionMode;
use saga_run_core::FailureCode;
use saga_run_core::RefreshOptions;
use saga_run_core::RunEventKind;
use saga_run_core::RunId;
use saga_run_core::RunStatus;
use saga_run_core::SagaId;
use saga_run_core::StepKey;
use saga_run_core::StepStatus;
use saga_run_core::Timestamp;
use saga_run_core::UpdateStepRequest;
use serde_json::json;
use system_tests::fixtures::CHECKOUT_SAGA_ID;
use system_tests::fixtures::api_trace;
use system_tests::fixtures::memory_orchestrator;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn create_request(run_id: &str) -> CreateRunRequest {
    CreateRunRequest {
        run_id: RunId::new(run_id),
        saga_id: SagaId::new(CHECKOUT_SAGA_ID),
        tenant_id: None,
        mode: ExecutionMode::DryRun,
        context: Some(json!({"environment": "staging"})),
        caller: None,
    }
}

fn status_update(run_id: &str, step_key: &str, status: StepStatus) -> UpdateStepRequest {
    UpdateStepRequest {
        run_id: RunId::new(run_id),
        step_key: StepKey::new(step_key),
        status,
        failure_code: None,
        failure_message: None,
        result: None,
        assertions: None,
        caller: None,
    }
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

#[test]
fn checkout_run_lifecycle() {
    let engine = memory_orchestrator();
    let events: Arc<Mutex<Vec<RunEventKind>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let _subscription = engine
        .publisher()
        .subscribe(move |event| sink.lock().expect("event sink").push(event.kind));

    // Creation materializes three pending steps and two actor profiles.
    let run = engine.create_run(create_request("run-1"), ts(1_000)).expect("create run");
    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(run.counters.total, 3);
    assert_eq!(run.counters.pending, 3);
    let run_id = run.run_id.clone();

    let profiles = engine.profiles(&run_id).expect("profiles");
    assert_eq!(profiles.len(), 2);
    for profile in &profiles {
        assert!(profile.virtual_email.ends_with("@sagarun.test"));
        assert!(profile.virtual_phone.starts_with("+1"));
    }

    // First step: start, capture evidence, pass.
    let outcome = engine
        .update_step(status_update("run-1", "add-to-cart", StepStatus::InProgress), ts(2_000))
        .expect("start add-to-cart");
    assert_eq!(outcome.step.attempts, 1);
    assert_eq!(outcome.run.status, RunStatus::Running);
    assert_eq!(outcome.run.started_at, Some(ts(2_000)));

    // Passing without the required trace is rejected.
    let gated = engine
        .update_step(status_update("run-1", "add-to-cart", StepStatus::Passed), ts(2_500))
        .expect_err("pass without evidence");
    assert!(matches!(gated, EngineError::EvidenceMissing { .. }));

    engine
        .save_artifact(api_trace(&run_id, "add-to-cart"), None, ts(2_600))
        .expect("append trace");
    let mut pass = status_update("run-1", "add-to-cart", StepStatus::Passed);
    pass.result = Some(json!({"cart_items": 1}));
    let outcome = engine.update_step(pass, ts(3_000)).expect("pass add-to-cart");
    assert_eq!(outcome.step.status, StepStatus::Passed);
    assert_eq!(outcome.step.ended_at, Some(ts(3_000)));
    assert_eq!(outcome.run.counters.passed, 1);
    assert_eq!(outcome.run.status, RunStatus::Running);

    // Second step fails with an API error; the run fails on the same pass.
    engine
        .update_step(status_update("run-1", "pay", StepStatus::InProgress), ts(4_000))
        .expect("start pay");
    let mut fail = status_update("run-1", "pay", StepStatus::Failed);
    fail.failure_message = Some("HTTP 500 from payments API".to_string());
    let outcome = engine.update_step(fail, ts(5_000)).expect("fail pay");
    assert_eq!(outcome.run.status, RunStatus::Failed);
    assert_eq!(outcome.run.ended_at, Some(ts(5_000)));

    let summary = outcome.run.summary.expect("summary");
    assert_eq!(summary.completion_pct, 33);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].step_key.as_str(), "pay");

    let report = engine.coverage(&run_id).expect("coverage").expect("report present");
    assert_eq!(report.completion_pct, 33);
    assert!(report.items.iter().any(|item| matches!(
        &item.subject,
        CoverageSubject::Step { step_key } if step_key.as_str() == "pay"
    )));

    // Terminal run rows reject further step work only via the state machine;
    // the failed step itself admits no outgoing transition.
    let stuck = engine
        .update_step(status_update("run-1", "pay", StepStatus::Passed), ts(6_000))
        .expect_err("terminal step transition");
    assert!(matches!(stuck, EngineError::InvalidTransition { .. }));

    // Archive the terminal run.
    let archived = engine.archive_run(&run_id, None, ts(7_000)).expect("archive");
    assert!(archived.archived);

    let kinds = events.lock().expect("event sink");
    assert_eq!(kinds.first(), Some(&RunEventKind::RunCreated));
    assert!(kinds.contains(&RunEventKind::ArtifactCreated));
    assert!(kinds.contains(&RunEventKind::StepUpdated));
    assert!(kinds.contains(&RunEventKind::RunCompleted));
    assert_eq!(kinds.last(), Some(&RunEventKind::RunArchived));
}

#[test]
fn structured_failure_codes_win_over_heuristics() {
    let engine = memory_orchestrator();
    engine.create_run(create_request("run-1"), ts(1_000)).expect("create run");
    engine
        .update_step(status_update("run-1", "add-to-cart", StepStatus::InProgress), ts(2_000))
        .expect("start");
    let mut fail = status_update("run-1", "add-to-cart", StepStatus::Failed);
    fail.failure_code = Some(FailureCode::new(FailureCode::NOT_IMPLEMENTED));
    fail.failure_message = Some("HTTP 500 would normally read as an API failure".to_string());
    let outcome = engine.update_step(fail, ts(3_000)).expect("fail step");

    // The structured code drives the workaround axis, not the message text.
    let summary = outcome.run.summary.expect("summary");
    assert_eq!(summary.workaround.as_str(), "workaround-heavy");
}

#[test]
fn stale_run_is_auto_closed_on_refresh() {
    let engine = memory_orchestrator();
    let run = engine.create_run(create_request("run-1"), ts(1_000)).expect("create run");

    // All steps pending, nothing in progress: a passive probe 46 minutes
    // after creation must auto-close the run as failed.
    let later = ts(1_000 + 46 * 60 * 1_000);
    let refreshed = engine
        .refresh_run_status(&run.run_id, RefreshOptions::passive(), None, later)
        .expect("refresh");
    assert_eq!(refreshed.status, RunStatus::Failed);
    let summary = refreshed.summary.expect("summary");
    let auto_closed = summary.auto_closed.expect("auto close marker");
    assert_eq!(auto_closed.threshold_millis, 45 * 60 * 1_000);
}

#[test]
fn cancellation_sticks_through_later_passes() {
    let engine = memory_orchestrator();
    let run = engine.create_run(create_request("run-1"), ts(1_000)).expect("create run");

    let premature = engine.archive_run(&run.run_id, None, ts(1_500));
    assert!(premature.is_err(), "archive must reject non-terminal runs");

    let cancelled = engine.cancel_run(&run.run_id, None, ts(2_000)).expect("cancel");
    assert_eq!(cancelled.status, RunStatus::Cancelled);

    let refreshed = engine
        .refresh_run_status(&run.run_id, RefreshOptions::active(), None, ts(3_000))
        .expect("refresh after cancel");
    assert_eq!(refreshed.status, RunStatus::Cancelled);

    let archived = engine.archive_run(&run.run_id, None, ts(4_000)).expect("archive");
    assert!(archived.archived);
}
