// crates/saga-run-core/src/core/artifact.rs
// ============================================================================
// Module: Saga Run Artifacts
// Description: Append-only evidence records keyed by run and step.
// Purpose: Anchor step outcomes to verifiable captured evidence.
// Dependencies: crate::core::{hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Artifacts are the evidence blobs (traces, snapshots, reports) consumed by
//! the evidence gate and the coverage classifier. Records are created only
//! via the artifact ledger's append operation and are never mutated or
//! deleted within a run's active lifetime. A null step key anchors run-level
//! evidence such as the final report.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::StepKey;
use crate::core::spec::EvidenceKind;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Artifact Kind
// ============================================================================

/// Artifact types accepted by the ledger.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Run-level or step-level report document.
    Report,
    /// UI or data snapshot.
    Snapshot,
    /// Captured API request/response trace.
    ApiTrace,
    /// Step execution log.
    StepLog,
    /// Generic attachment.
    Attachment,
}

impl ArtifactKind {
    /// Returns a stable label for summaries and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Snapshot => "snapshot",
            Self::ApiTrace => "api_trace",
            Self::StepLog => "step_log",
            Self::Attachment => "attachment",
        }
    }

    /// Returns the artifact kind that satisfies an evidence requirement.
    #[must_use]
    pub const fn for_evidence(kind: EvidenceKind) -> Self {
        match kind {
            EvidenceKind::ApiTrace => Self::ApiTrace,
            EvidenceKind::Snapshot => Self::Snapshot,
            EvidenceKind::ReportNote => Self::Report,
            EvidenceKind::EventRef => Self::StepLog,
        }
    }
}

// ============================================================================
// SECTION: Artifact Record
// ============================================================================

/// One evidence record, optionally anchored to a step.
///
/// # Invariants
/// - Append-only; never mutated or deleted while the run is active.
/// - `checksum` matches the appended body bytes (canonical form for JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRunArtifact {
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Owning run identifier.
    pub run_id: RunId,
    /// Anchoring step key; `None` for run-level evidence.
    pub step_key: Option<StepKey>,
    /// Artifact type.
    pub kind: ArtifactKind,
    /// Human-readable title.
    pub title: String,
    /// Storage locator (opaque to the engine).
    pub locator: String,
    /// Declared content type.
    pub content_type: String,
    /// Body size in bytes.
    pub byte_size: u64,
    /// Content checksum.
    pub checksum: HashDigest,
    /// Capture timestamp.
    pub captured_at: Timestamp,
}
