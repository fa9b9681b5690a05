// system-tests/src/lib.rs
// ============================================================================
// Module: Saga Run System Tests Library
// Description: Shared fixtures for end-to-end engine scenarios.
// Purpose: Provide a reference saga spec and orchestrator builders.
// Dependencies: saga-run-core
// ============================================================================

//! ## Overview
//! This crate hosts shared fixtures used by the end-to-end scenarios in
//! `system-tests/tests`: a reference checkout saga and helpers for wiring an
//! orchestrator over the in-memory backends.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod fixtures;
