// crates/saga-run-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Run Store
// Description: Durable RunStore and ArtifactLedger backends using SQLite WAL.
// Purpose: Provide production-grade persistence for saga run lifecycles.
// Dependencies: saga-run-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a `SQLite`-backed implementation of the engine's
//! storage seams: [`saga_run_core::RunStore`] for runs, steps, actors,
//! messages, and coverage, and [`saga_run_core::ArtifactLedger`] for the
//! append-only evidence ledger. Coverage snapshots are stored as canonical
//! JSON with integrity hashes and fail closed on corruption.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteRunStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
