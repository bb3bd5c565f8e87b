//! Assertions on verification outcomes.

use crate::validate::{PredicateStatus, Verdict, VerificationOutcome};

/// Asserts that the case passed.
pub fn assert_case_passed(outcome: &VerificationOutcome) {
    assert_verdict(outcome, Verdict::Passed);
}

/// Asserts that the case failed.
pub fn assert_case_failed(outcome: &VerificationOutcome) {
    assert_verdict(outcome, Verdict::Failed);
}

/// Asserts that the case was inconclusive.
pub fn assert_case_inconclusive(outcome: &VerificationOutcome) {
    assert_verdict(outcome, Verdict::Inconclusive);
}

/// Asserts the verdict, printing the rendered report on mismatch.
pub fn assert_verdict(outcome: &VerificationOutcome, expected: Verdict) {
    assert_eq!(
        outcome.verdict,
        expected,
        "Expected case '{}' to be {}, got {}\n{}",
        outcome.case_name,
        expected,
        outcome.verdict,
        outcome.render(usize::MAX)
    );
}

/// Asserts that the case aborted with an error of the given kind.
pub fn assert_case_errored(outcome: &VerificationOutcome, kind: &str) {
    let actual = outcome.error.as_ref().map(|e| e.kind.as_str());
    assert_eq!(
        actual,
        Some(kind),
        "Expected case '{}' to error with '{}'\n{}",
        outcome.case_name,
        kind,
        outcome.render(usize::MAX)
    );
}

/// Asserts the number of violating items.
pub fn assert_violation_count(outcome: &VerificationOutcome, expected: usize) {
    assert_eq!(
        outcome.violating_items.len(),
        expected,
        "Unexpected violation count for '{}'\n{}",
        outcome.case_name,
        outcome.render(usize::MAX)
    );
}

/// Asserts the status of the primary predicate on `field`.
pub fn assert_predicate_status(outcome: &VerificationOutcome, field: &str, expected: PredicateStatus) {
    let report = outcome
        .predicates
        .iter()
        .find(|p| p.predicate.field() == Some(field))
        .unwrap_or_else(|| panic!("No predicate on '{field}' in case '{}'", outcome.case_name));
    assert_eq!(
        report.status, expected,
        "Unexpected status for predicate '{}'",
        report.predicate
    );
}
