// system-tests/src/fixtures.rs
// ============================================================================
// Module: Shared Test Fixtures
// Description: Reference checkout saga and orchestrator builders.
// Purpose: Keep end-to-end scenarios focused on behavior, not setup.
// Dependencies: saga-run-core
// ============================================================================

//! ## Overview
//! A three-step checkout saga (browse, then pay and confirm) with two actors,
//! plus builders for an orchestrator wired over the in-memory backends and
//! for the evidence artifacts the gate requires.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use saga_run_core::ActorKey;
use saga_run_core::ActorSpec;
use saga_run_core::ArtifactBody;
use saga_run_core::ArtifactKind;
use saga_run_core::EventPublisher;
use saga_run_core::EvidenceKind;
use saga_run_core::InMemoryArtifactLedger;
use saga_run_core::InMemoryRunStore;
use saga_run_core::InMemorySpecProvider;
use saga_run_core::NewArtifact;
use saga_run_core::OrchestratorConfig;
use saga_run_core::PhaseSpec;
use saga_run_core::RequirementId;
use saga_run_core::RunId;
use saga_run_core::RunOrchestrator;
use saga_run_core::SagaId;
use saga_run_core::SagaSpec;
use saga_run_core::StepKey;
use saga_run_core::StepSpec;
use serde_json::json;

// ============================================================================
// SECTION: Saga Spec
// ============================================================================

/// Saga identifier used by all fixture scenarios.
pub const CHECKOUT_SAGA_ID: &str = "checkout-saga";

/// Builds the reference checkout saga: one browse phase with a single step,
/// one checkout phase with payment and confirmation steps.
#[must_use]
pub fn checkout_spec() -> SagaSpec {
    SagaSpec {
        saga_id: SagaId::new(CHECKOUT_SAGA_ID),
        title: "Guest checkout".to_string(),
        requirements: vec![RequirementId::new("req-guest-checkout")],
        actors: vec![
            ActorSpec {
                actor_key: ActorKey::new("shopper"),
                display_name: "Sam Shopper".to_string(),
                role: "customer".to_string(),
            },
            ActorSpec {
                actor_key: ActorKey::new("agent"),
                display_name: "Ana Agent".to_string(),
                role: "staff".to_string(),
            },
        ],
        phases: vec![
            PhaseSpec {
                phase_key: "browse".to_string(),
                order: 1,
                title: "Browse".to_string(),
                steps: vec![step("add-to-cart", 1, "shopper", "Add one item to the cart")],
            },
            PhaseSpec {
                phase_key: "checkout".to_string(),
                order: 2,
                title: "Checkout".to_string(),
                steps: vec![
                    step("pay", 1, "shopper", "Pay with the stored card"),
                    step("confirm", 2, "agent", "Confirm the order in the back office"),
                ],
            },
        ],
    }
}

/// Builds one fixture step requiring an API trace.
fn step(step_key: &str, order: u32, actor_key: &str, instruction: &str) -> StepSpec {
    StepSpec {
        step_key: StepKey::new(step_key),
        order,
        actor_key: ActorKey::new(actor_key),
        instruction: instruction.to_string(),
        expected_result: "Succeeds without errors".to_string(),
        delay: None,
        evidence_required: vec![EvidenceKind::ApiTrace],
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds an orchestrator over fresh in-memory backends with the checkout
/// saga registered.
#[must_use]
pub fn memory_orchestrator()
-> RunOrchestrator<InMemoryRunStore, InMemoryArtifactLedger, InMemorySpecProvider> {
    let specs = InMemorySpecProvider::new();
    specs.register(checkout_spec());
    RunOrchestrator::new(
        InMemoryRunStore::new(),
        InMemoryArtifactLedger::new(),
        specs,
        Arc::new(EventPublisher::default()),
        OrchestratorConfig::default(),
    )
}

/// Builds the API trace artifact the evidence gate requires for a step pass.
#[must_use]
pub fn api_trace(run_id: &RunId, step_key: &str) -> NewArtifact {
    NewArtifact {
        run_id: run_id.clone(),
        step_key: Some(StepKey::new(step_key)),
        kind: ArtifactKind::ApiTrace,
        title: format!("trace for {step_key}"),
        locator: format!("mem://{step_key}/trace"),
        content_type: "application/json".to_string(),
        body: ArtifactBody::Json(json!({"status": 200, "step": step_key})),
    }
}
