// crates/saga-run-core/src/core/coverage.rs
// ============================================================================
// Module: Coverage Classifier
// Description: Pure derivation of coverage verdicts and axis tags.
// Purpose: Turn aggregate integrity signals into a three-axis coverage report.
// Dependencies: crate::core::{identifiers, spec, state, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! The classifier is a set of pure functions over integrity signals extracted
//! during an aggregator pass: per-step failures, advisory missing-evidence
//! entries, and counts of "not implemented" and "API failure" outcomes. It
//! derives a coarse classification, a refined verdict, and two axis tags
//! (workaround severity and implementation locus), then assembles the
//! replace-on-write coverage report.
//!
//! Failure-category detection prefers a structured failure code supplied by
//! the caller and falls back to substring heuristics on the free-text
//! message. The heuristic is known to be fragile, so it lives behind the
//! [`FailureClassifier`] seam and can be swapped without touching the
//! aggregator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RequirementId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::SagaId;
use crate::core::identifiers::StepKey;
use crate::core::spec::EvidenceKind;
use crate::core::state::FailureCode;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Integrity Signals
// ============================================================================

/// One failing or blocked step surfaced by the aggregator.
///
/// # Invariants
/// - `message` is the caller-supplied free text, untrusted and uninterpreted
///   beyond category heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    /// Failing step key.
    pub step_key: StepKey,
    /// Structured failure code when supplied.
    pub code: Option<FailureCode>,
    /// Free-text failure message when supplied.
    pub message: Option<String>,
}

/// Advisory missing-evidence entry for one step.
///
/// # Invariants
/// - `kinds` lists only requirements declared by the step's spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEvidence {
    /// Step key with incomplete evidence.
    pub step_key: StepKey,
    /// Evidence kinds still missing.
    pub kinds: Vec<EvidenceKind>,
}

/// Aggregate integrity signals feeding classification.
///
/// # Invariants
/// - Counts are derived from the same step scan as `step_failures`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IntegritySignals {
    /// Failing or blocked steps.
    pub step_failures: Vec<StepFailure>,
    /// Steps with incomplete advisory evidence.
    pub missing_evidence: Vec<MissingEvidence>,
    /// Steps whose failure was categorized as "not implemented".
    pub not_implemented_steps: u32,
    /// Steps whose failure was categorized as an API failure.
    pub api_failure_steps: u32,
}

// ============================================================================
// SECTION: Failure Categorization
// ============================================================================

/// Semantic category of a step failure.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No executor exists for the step.
    NotImplemented,
    /// An API call returned an error status.
    ApiFailure,
    /// Any other failure.
    Other,
}

/// Pluggable failure categorizer consulted during signal extraction.
pub trait FailureClassifier: Send + Sync {
    /// Categorizes a step failure from its structured code and free text.
    fn categorize(&self, code: Option<&FailureCode>, message: Option<&str>) -> FailureKind;
}

/// Default categorizer: structured codes first, substring heuristics second.
///
/// # Invariants
/// - A recognized structured code always wins over the message heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicFailureClassifier;

impl FailureClassifier for HeuristicFailureClassifier {
    fn categorize(&self, code: Option<&FailureCode>, message: Option<&str>) -> FailureKind {
        if let Some(code) = code {
            match code.as_str() {
                FailureCode::NOT_IMPLEMENTED => return FailureKind::NotImplemented,
                FailureCode::API_FAILURE => return FailureKind::ApiFailure,
                _ => {}
            }
        }
        let Some(message) = message else {
            return FailureKind::Other;
        };
        let lowered = message.to_lowercase();
        if lowered.contains("no executor mapping") || lowered.contains("not implemented") {
            return FailureKind::NotImplemented;
        }
        if lowered.contains("http 4") || lowered.contains("http 5") {
            return FailureKind::ApiFailure;
        }
        FailureKind::Other
    }
}

// ============================================================================
// SECTION: Classification Tags
// ============================================================================

/// Coarse completion classification.
///
/// # Invariants
/// - Variants are stable for serialization and tag registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// Zero failures and every step passed.
    Full,
    /// Some steps passed but not all, or failures exist alongside passes.
    Partial,
    /// No step passed.
    Gap,
}

impl Classification {
    /// Returns the stable tag value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
            Self::Gap => "gap",
        }
    }
}

/// Refined four-way coverage verdict.
///
/// # Invariants
/// - Variants are stable for serialization and tag registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoverageVerdict {
    /// Classification stayed full.
    Full,
    /// High completion with at most two step failures.
    Strong,
    /// Partial classification not meeting the strong gate.
    Partial,
    /// No steps passed.
    Gap,
}

impl CoverageVerdict {
    /// Returns the stable tag value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Strong => "strong",
            Self::Partial => "partial",
            Self::Gap => "gap",
        }
    }
}

/// Native-to-hacky axis (workaround severity).
///
/// # Invariants
/// - Variants are stable for serialization and tag registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkaroundAxis {
    /// No workarounds and a full verdict.
    Native,
    /// No workarounds and a strong verdict.
    MostlyNative,
    /// No workarounds but a partial or gap verdict.
    MixedModel,
    /// One to three steps required workarounds.
    WorkaroundHeavy,
    /// More than three steps required workarounds.
    Hacky,
}

impl WorkaroundAxis {
    /// Returns the stable tag value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::MostlyNative => "mostly-native",
            Self::MixedModel => "mixed-model",
            Self::WorkaroundHeavy => "workaround-heavy",
            Self::Hacky => "hacky",
        }
    }
}

/// Core-to-extension axis (implementation locus).
///
/// # Invariants
/// - Variants are stable for serialization and tag registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocusAxis {
    /// Full verdict with no extension signals.
    CoreNative,
    /// Strong verdict with no extension signals.
    CoreFirst,
    /// Partial or gap verdict with no extension signals.
    BalancedCoreExtension,
    /// Some not-implemented steps or more than two API failures.
    ExtensionHeavy,
    /// More than four not-implemented steps.
    ExtensionDriven,
}

impl LocusAxis {
    /// Returns the stable tag value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CoreNative => "core-native",
            Self::CoreFirst => "core-first",
            Self::BalancedCoreExtension => "balanced-core-extension",
            Self::ExtensionHeavy => "extension-heavy",
            Self::ExtensionDriven => "extension-driven",
        }
    }
}

// ============================================================================
// SECTION: Classification Functions
// ============================================================================

/// Threshold for the strong verdict's completion gate (percent).
const STRONG_COMPLETION_PCT: u8 = 70;
/// Maximum step failures admitted by the strong verdict.
const STRONG_MAX_FAILURES: usize = 2;
/// Not-implemented count above which the workaround axis is hacky.
const HACKY_NOT_IMPLEMENTED: u32 = 3;
/// Not-implemented count above which the locus axis is extension-driven.
const EXTENSION_DRIVEN_NOT_IMPLEMENTED: u32 = 4;
/// API-failure count above which the locus axis is extension-heavy.
const EXTENSION_HEAVY_API_FAILURES: u32 = 2;

/// Computes the rounded completion percentage (`passed / total * 100`).
#[must_use]
pub fn completion_pct(passed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let scaled = (u64::from(passed) * 100 + u64::from(total) / 2) / u64::from(total);
    u8::try_from(scaled.min(100)).unwrap_or(100)
}

/// Derives the coarse three-way classification.
#[must_use]
pub const fn classification(passed: u32, total: u32, failure_count: usize) -> Classification {
    if failure_count == 0 && passed == total && total > 0 {
        Classification::Full
    } else if passed > 0 {
        Classification::Partial
    } else {
        Classification::Gap
    }
}

/// Refines the classification into the four-way verdict.
#[must_use]
pub const fn verdict(
    classification: Classification,
    completion_pct: u8,
    failure_count: usize,
) -> CoverageVerdict {
    match classification {
        Classification::Full => CoverageVerdict::Full,
        Classification::Partial | Classification::Gap => {
            if completion_pct >= STRONG_COMPLETION_PCT && failure_count <= STRONG_MAX_FAILURES {
                CoverageVerdict::Strong
            } else if matches!(classification, Classification::Partial) {
                CoverageVerdict::Partial
            } else {
                CoverageVerdict::Gap
            }
        }
    }
}

/// Derives the native-to-hacky axis tag.
#[must_use]
pub const fn workaround_axis(not_implemented: u32, verdict: CoverageVerdict) -> WorkaroundAxis {
    if not_implemented > HACKY_NOT_IMPLEMENTED {
        WorkaroundAxis::Hacky
    } else if not_implemented > 0 {
        WorkaroundAxis::WorkaroundHeavy
    } else {
        match verdict {
            CoverageVerdict::Full => WorkaroundAxis::Native,
            CoverageVerdict::Strong => WorkaroundAxis::MostlyNative,
            CoverageVerdict::Partial | CoverageVerdict::Gap => WorkaroundAxis::MixedModel,
        }
    }
}

/// Derives the core-to-extension axis tag.
#[must_use]
pub const fn locus_axis(
    not_implemented: u32,
    api_failures: u32,
    verdict: CoverageVerdict,
) -> LocusAxis {
    if not_implemented > EXTENSION_DRIVEN_NOT_IMPLEMENTED {
        LocusAxis::ExtensionDriven
    } else if not_implemented > 0 || api_failures > EXTENSION_HEAVY_API_FAILURES {
        LocusAxis::ExtensionHeavy
    } else {
        match verdict {
            CoverageVerdict::Full => LocusAxis::CoreNative,
            CoverageVerdict::Strong => LocusAxis::CoreFirst,
            CoverageVerdict::Partial | CoverageVerdict::Gap => LocusAxis::BalancedCoreExtension,
        }
    }
}

// ============================================================================
// SECTION: Coverage Report
// ============================================================================

/// Subject of one coverage item.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverageSubject {
    /// The run as a whole.
    Run,
    /// One failing or blocked step.
    Step {
        /// Step key.
        step_key: StepKey,
    },
    /// One requirement linked to the saga spec.
    Requirement {
        /// Requirement identifier.
        requirement_id: RequirementId,
    },
}

/// One evaluated unit inside a coverage report.
///
/// # Invariants
/// - Step items always carry the gap classification.
/// - Run and requirement items inherit the run-level tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageItem {
    /// Evaluated subject.
    pub subject: CoverageSubject,
    /// Classification for the subject.
    pub classification: Classification,
    /// Verdict for the subject.
    pub verdict: CoverageVerdict,
    /// Workaround axis tag for the subject.
    pub workaround: WorkaroundAxis,
    /// Locus axis tag for the subject.
    pub locus: LocusAxis,
    /// Short human-readable note.
    pub note: String,
}

/// Point-in-time coverage verdict snapshot for one run.
///
/// # Invariants
/// - Upserted by run id; items are fully replaced on every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Saga identifier.
    pub saga_id: SagaId,
    /// Run-level classification.
    pub classification: Classification,
    /// Run-level verdict.
    pub verdict: CoverageVerdict,
    /// Run-level workaround axis tag.
    pub workaround: WorkaroundAxis,
    /// Run-level locus axis tag.
    pub locus: LocusAxis,
    /// Rounded completion percentage.
    pub completion_pct: u8,
    /// Timestamp of the pass that produced this report.
    pub generated_at: Timestamp,
    /// Per-item breakdown (run, failing steps, requirements).
    pub items: Vec<CoverageItem>,
}

impl CoverageReport {
    /// Returns the distinct tag values bound to this report, for idempotent
    /// registration in the tag dictionary.
    #[must_use]
    pub fn tag_values(&self) -> Vec<&'static str> {
        let mut tags = vec![
            self.classification.as_str(),
            self.verdict.as_str(),
            self.workaround.as_str(),
            self.locus.as_str(),
        ];
        for item in &self.items {
            for tag in [
                item.classification.as_str(),
                item.verdict.as_str(),
                item.workaround.as_str(),
                item.locus.as_str(),
            ] {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
        tags
    }
}
