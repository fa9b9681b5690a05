// crates/saga-run-core/tests/classifier.rs
// ============================================================================
// Module: Coverage Classifier Tests
// Description: Validate classification, verdict, and axis boundary cases.
// Purpose: Pin the exact thresholds of the three-axis coverage verdict.
// Dependencies: saga-run-core, proptest
// ============================================================================

//! Boundary tests for the coverage classifier and failure categorizer.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use saga_run_core::Classification;
use saga_run_core::CoverageVerdict;
use saga_run_core::FailureClassifier;
use saga_run_core::FailureCode;
use saga_run_core::FailureKind;
use saga_run_core::HeuristicFailureClassifier;
use saga_run_core::LocusAxis;
use saga_run_core::WorkaroundAxis;
use saga_run_core::core::coverage::classification;
use saga_run_core::core::coverage::completion_pct;
use saga_run_core::core::coverage::locus_axis;
use saga_run_core::core::coverage::verdict;
use saga_run_core::core::coverage::workaround_axis;

// ============================================================================
// SECTION: Classification & Verdict
// ============================================================================

#[test]
fn classification_boundaries() {
    assert_eq!(classification(3, 3, 0), Classification::Full);
    assert_eq!(classification(3, 3, 1), Classification::Partial);
    assert_eq!(classification(1, 3, 0), Classification::Partial);
    assert_eq!(classification(0, 3, 2), Classification::Gap);
    assert_eq!(classification(0, 0, 0), Classification::Gap);
}

#[test]
fn completion_rounds_to_nearest_percent() {
    assert_eq!(completion_pct(1, 3), 33);
    assert_eq!(completion_pct(2, 3), 67);
    assert_eq!(completion_pct(0, 0), 0);
    assert_eq!(completion_pct(7, 7), 100);
}

#[test]
fn strong_verdict_requires_seventy_percent() {
    assert_eq!(verdict(Classification::Partial, 70, 2), CoverageVerdict::Strong);
    assert_eq!(verdict(Classification::Partial, 69, 2), CoverageVerdict::Partial);
}

#[test]
fn strong_verdict_admits_at_most_two_failures() {
    assert_eq!(verdict(Classification::Partial, 90, 2), CoverageVerdict::Strong);
    assert_eq!(verdict(Classification::Partial, 90, 3), CoverageVerdict::Partial);
}

#[test]
fn gap_classification_never_strengthens_below_the_gate() {
    assert_eq!(verdict(Classification::Full, 100, 0), CoverageVerdict::Full);
    assert_eq!(verdict(Classification::Gap, 0, 5), CoverageVerdict::Gap);
    // A gap run meeting the strong gate is still reported as strong; the
    // gate looks at completion and failure count only.
    assert_eq!(verdict(Classification::Gap, 70, 0), CoverageVerdict::Strong);
}

// ============================================================================
// SECTION: Axes
// ============================================================================

#[test]
fn workaround_axis_boundaries() {
    assert_eq!(workaround_axis(0, CoverageVerdict::Full), WorkaroundAxis::Native);
    assert_eq!(workaround_axis(0, CoverageVerdict::Strong), WorkaroundAxis::MostlyNative);
    assert_eq!(workaround_axis(0, CoverageVerdict::Partial), WorkaroundAxis::MixedModel);
    assert_eq!(workaround_axis(1, CoverageVerdict::Full), WorkaroundAxis::WorkaroundHeavy);
    assert_eq!(workaround_axis(3, CoverageVerdict::Full), WorkaroundAxis::WorkaroundHeavy);
    assert_eq!(workaround_axis(4, CoverageVerdict::Full), WorkaroundAxis::Hacky);
}

#[test]
fn locus_axis_boundaries() {
    assert_eq!(locus_axis(0, 0, CoverageVerdict::Full), LocusAxis::CoreNative);
    assert_eq!(locus_axis(0, 0, CoverageVerdict::Strong), LocusAxis::CoreFirst);
    assert_eq!(locus_axis(0, 0, CoverageVerdict::Gap), LocusAxis::BalancedCoreExtension);
    assert_eq!(locus_axis(0, 2, CoverageVerdict::Full), LocusAxis::CoreNative);
    assert_eq!(locus_axis(0, 3, CoverageVerdict::Full), LocusAxis::ExtensionHeavy);
    assert_eq!(locus_axis(1, 0, CoverageVerdict::Full), LocusAxis::ExtensionHeavy);
    assert_eq!(locus_axis(4, 0, CoverageVerdict::Full), LocusAxis::ExtensionHeavy);
    assert_eq!(locus_axis(5, 0, CoverageVerdict::Full), LocusAxis::ExtensionDriven);
}

// ============================================================================
// SECTION: Failure Categorizer
// ============================================================================

#[test]
fn structured_codes_beat_message_heuristics() {
    let classifier = HeuristicFailureClassifier;
    let code = FailureCode::new(FailureCode::NOT_IMPLEMENTED);
    let kind = classifier.categorize(Some(&code), Some("HTTP 500 from the gateway"));
    assert_eq!(kind, FailureKind::NotImplemented);
}

#[test]
fn message_heuristics_recognize_known_phrases() {
    let classifier = HeuristicFailureClassifier;
    assert_eq!(
        classifier.categorize(None, Some("No executor mapping for step pay")),
        FailureKind::NotImplemented
    );
    assert_eq!(
        classifier.categorize(None, Some("step is NOT IMPLEMENTED yet")),
        FailureKind::NotImplemented
    );
    assert_eq!(
        classifier.categorize(None, Some("upstream returned HTTP 503")),
        FailureKind::ApiFailure
    );
    assert_eq!(
        classifier.categorize(None, Some("got http 404 from the catalog")),
        FailureKind::ApiFailure
    );
}

#[test]
fn unrecognized_failures_are_other() {
    let classifier = HeuristicFailureClassifier;
    assert_eq!(classifier.categorize(None, None), FailureKind::Other);
    assert_eq!(classifier.categorize(None, Some("assertion mismatch")), FailureKind::Other);
    let code = FailureCode::new("custom_code");
    assert_eq!(classifier.categorize(Some(&code), Some("ordinary text")), FailureKind::Other);
}

// ============================================================================
// SECTION: Totality
// ============================================================================

proptest! {
    /// The derivation never panics and the axes stay consistent with the
    /// verdict whenever no workaround or extension signals are present.
    #[test]
    fn axes_are_total_and_verdict_consistent(
        passed in 0u32 .. 10_000,
        total in 0u32 .. 10_000,
        failures in 0usize .. 512,
        not_implemented in 0u32 .. 64,
        api_failures in 0u32 .. 64,
    ) {
        let class = classification(passed, total, failures);
        let pct = completion_pct(passed, total);
        let run_verdict = verdict(class, pct, failures);
        let workaround = workaround_axis(not_implemented, run_verdict);
        let locus = locus_axis(not_implemented, api_failures, run_verdict);

        prop_assert!(pct <= 100);
        if not_implemented == 0 {
            let expected = match run_verdict {
                CoverageVerdict::Full => WorkaroundAxis::Native,
                CoverageVerdict::Strong => WorkaroundAxis::MostlyNative,
                CoverageVerdict::Partial | CoverageVerdict::Gap => WorkaroundAxis::MixedModel,
            };
            prop_assert_eq!(workaround, expected);
        }
        if not_implemented == 0 && api_failures <= 2 {
            let expected = match run_verdict {
                CoverageVerdict::Full => LocusAxis::CoreNative,
                CoverageVerdict::Strong => LocusAxis::CoreFirst,
                CoverageVerdict::Partial | CoverageVerdict::Gap => {
                    LocusAxis::BalancedCoreExtension
                }
            };
            prop_assert_eq!(locus, expected);
        }
    }
}
