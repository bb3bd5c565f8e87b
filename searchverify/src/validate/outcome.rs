//! Verdicts and per-case outcome reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use uuid::Uuid;

use crate::errors::VerifyError;
use crate::item::ResultItem;
use crate::predicate::{Predicate, Target};
use crate::query::{SearchTarget, SortDirection};

/// Three-valued result of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every predicate held.
    Passed,
    /// At least one hard violation, or the case errored.
    Failed,
    /// Nothing failed but something could not be checked.
    Inconclusive,
}

impl Verdict {
    /// Combines predicate statuses: any violation fails, else any unverifiable is inconclusive.
    #[must_use]
    pub fn from_statuses(statuses: impl IntoIterator<Item = PredicateStatus>) -> Self {
        let mut verdict = Self::Passed;
        for status in statuses {
            match status {
                PredicateStatus::Violated => return Self::Failed,
                PredicateStatus::Unverifiable => verdict = Self::Inconclusive,
                PredicateStatus::Satisfied => {}
            }
        }
        verdict
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// Status of one check across a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateStatus {
    /// Held for every checked item.
    Satisfied,
    /// Failed for at least one item.
    Violated,
    /// Could not be checked.
    Unverifiable,
}

impl fmt::Display for PredicateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => write!(f, "satisfied"),
            Self::Violated => write!(f, "violated"),
            Self::Unverifiable => write!(f, "unverifiable"),
        }
    }
}

/// Result of one predicate over a batch.
#[derive(Debug, Clone, Serialize)]
pub struct PredicateReport {
    /// The predicate.
    pub predicate: Predicate,
    /// Batch status.
    pub status: PredicateStatus,
    /// Items the predicate was evaluated against.
    pub checked_items: usize,
    /// Items that violated it.
    pub violations: usize,
    /// Explanation for unverifiable or collection-level failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One item that broke one predicate.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// The offending item.
    pub item: ResultItem,
    /// The predicate it broke.
    pub predicate: Predicate,
    /// The value that was read; `None` when the field was absent.
    pub observed: Option<Value>,
}

impl Violation {
    /// One-line description with the observed value.
    #[must_use]
    pub fn describe(&self) -> String {
        let observed = self
            .observed
            .as_ref()
            .map_or_else(|| "<absent>".to_string(), Value::to_string);
        let field = self.predicate.field().unwrap_or("<free text>");
        format!(
            "{} has {field}={observed}, violating '{}'",
            self.item.label(),
            self.predicate
        )
    }
}

/// Expected size of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum CountExpectation {
    /// No results.
    Empty,
    /// Exactly this many results.
    Exactly(u64),
    /// At least this many results.
    AtLeast(u64),
}

impl CountExpectation {
    /// Checks an observed count.
    #[must_use]
    pub const fn check(&self, observed: u64) -> CountReport {
        let status = match self {
            Self::Empty => observed == 0,
            Self::Exactly(n) => observed == *n,
            Self::AtLeast(n) => observed >= *n,
        };
        CountReport {
            expected: *self,
            observed,
            status: if status {
                PredicateStatus::Satisfied
            } else {
                PredicateStatus::Violated
            },
        }
    }
}

impl fmt::Display for CountExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no results"),
            Self::Exactly(n) => write!(f, "exactly {n} result(s)"),
            Self::AtLeast(n) => write!(f, "at least {n} result(s)"),
        }
    }
}

/// Result of a count expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountReport {
    /// What the case expected.
    pub expected: CountExpectation,
    /// Declared total, or the number of items fetched when no total was declared.
    pub observed: u64,
    /// Whether it matched.
    pub status: PredicateStatus,
}

/// Result of the sort-order check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderingReport {
    /// The `sort` key.
    pub key: String,
    /// Requested direction.
    pub direction: SortDirection,
    /// Index pairs `(i, i + 1)` whose values are out of order.
    pub breaks: Vec<(usize, usize)>,
    /// Satisfied, or unverifiable/violated depending on the policy.
    pub status: PredicateStatus,
}

/// Outcome of following secondary links for one primary item.
#[derive(Debug, Clone, Serialize)]
pub struct SecondaryReport {
    /// Label of the primary item.
    pub item_label: String,
    /// Resolved URL, if one could be derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Secondary predicate results.
    pub predicates: Vec<PredicateReport>,
    /// Size check on the followed payload, if the link expects one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<CountReport>,
    /// Why the payload was unavailable, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<String>,
}

/// An executor or construction error recorded on an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeError {
    /// Stable error code.
    pub kind: String,
    /// Display message.
    pub message: String,
    /// Structured context such as the HTTP status, URL or page.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
}

impl From<&VerifyError> for OutcomeError {
    fn from(err: &VerifyError) -> Self {
        let context = err
            .to_dict()
            .into_iter()
            .filter(|(key, _)| key != "type" && key != "message")
            .collect();
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            context,
        }
    }
}

/// Everything a case produced, handed to the reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    /// Unique id of this execution.
    pub run_id: Uuid,
    /// Case name.
    pub case_name: String,
    /// Endpoint family.
    pub target: SearchTarget,
    /// The `q` parameter sent, empty if the case never translated.
    pub query: String,
    /// Whether the case ran authenticated.
    pub authenticated: bool,
    /// Final verdict.
    pub verdict: Verdict,
    /// Primary predicate results.
    pub predicates: Vec<PredicateReport>,
    /// Every violation found, primary first then secondary.
    pub violating_items: Vec<Violation>,
    /// Sort-order check, when the case sorted by an ordered field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering: Option<OrderingReport>,
    /// Count expectation, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<CountReport>,
    /// Secondary resolution per followed item.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<SecondaryReport>,
    /// Status of the last search page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Search pages fetched.
    pub page_count: u32,
    /// Items fetched.
    pub item_count: usize,
    /// Total declared by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    /// Fatal error that aborted the case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
    /// When the case started.
    pub started_at: DateTime<Utc>,
    /// When the case concluded.
    pub finished_at: DateTime<Utc>,
}

impl VerificationOutcome {
    /// An outcome with no checks yet, used as the starting point of a case.
    #[must_use]
    pub fn new(case_name: impl Into<String>, target: SearchTarget, authenticated: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            case_name: case_name.into(),
            target,
            query: String::new(),
            authenticated,
            verdict: Verdict::Passed,
            predicates: Vec::new(),
            violating_items: Vec::new(),
            ordering: None,
            count: None,
            secondary: Vec::new(),
            http_status: None,
            page_count: 0,
            item_count: 0,
            total_count: None,
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// `true` only for a passed case.
    #[must_use]
    pub fn satisfied(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    /// Whether a fatal error aborted the case.
    #[must_use]
    pub const fn errored(&self) -> bool {
        self.error.is_some()
    }

    /// Primary violations.
    pub fn primary_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violating_items
            .iter()
            .filter(|v| v.predicate.applies_to() == Target::Primary)
    }

    /// Recomputes the verdict from every recorded check.
    ///
    /// An error always fails the case.
    pub fn conclude(&mut self) {
        self.finished_at = Utc::now();
        if self.error.is_some() {
            self.verdict = Verdict::Failed;
            return;
        }
        let statuses = self
            .predicates
            .iter()
            .map(|p| p.status)
            .chain(self.ordering.iter().map(|o| o.status))
            .chain(self.count.iter().map(|c| c.status))
            .chain(
                self.secondary
                    .iter()
                    .flat_map(|s| s.predicates.iter().map(|p| p.status).chain(s.count.iter().map(|c| c.status))),
            );
        self.verdict = Verdict::from_statuses(statuses);
    }

    /// Human-readable report listing at most `max_violations` violations.
    #[must_use]
    pub fn render(&self, max_violations: usize) -> String {
        let mut out = String::new();
        let mode = if self.authenticated { "authenticated" } else { "anonymous" };
        let _ = writeln!(out, "[{}] {}", self.verdict.to_string().to_uppercase(), self.case_name);
        let _ = writeln!(out, "  query: {} ({}, {mode})", self.query, self.target);

        let status = self
            .http_status
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let total = self
            .total_count
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        let _ = writeln!(
            out,
            "  status: {status}, pages: {}, items: {}, total: {total}",
            self.page_count, self.item_count
        );

        if let Some(error) = &self.error {
            let _ = writeln!(out, "  error ({}): {}", error.kind, error.message);
        }

        for report in self.predicates.iter().chain(self.secondary.iter().flat_map(|s| s.predicates.iter())) {
            if report.status == PredicateStatus::Satisfied {
                continue;
            }
            let _ = write!(
                out,
                "  predicate '{}': {} ({} of {} items)",
                report.predicate, report.status, report.violations, report.checked_items
            );
            if let Some(reason) = &report.reason {
                let _ = write!(out, ": {reason}");
            }
            out.push('\n');
        }

        if let Some(count) = &self.count {
            if count.status != PredicateStatus::Satisfied {
                let _ = writeln!(out, "  expected {}, got {}", count.expected, count.observed);
            }
        }
        if let Some(ordering) = &self.ordering {
            if ordering.status != PredicateStatus::Satisfied {
                let _ = writeln!(
                    out,
                    "  sort {} {}: {} ({} break(s))",
                    ordering.key,
                    ordering.direction.as_str(),
                    ordering.status,
                    ordering.breaks.len()
                );
            }
        }
        for secondary in &self.secondary {
            if let Some(missing) = &secondary.missing {
                let _ = writeln!(out, "  secondary {}: {missing}", secondary.item_label);
            }
            if let Some(count) = secondary.count.filter(|c| c.status != PredicateStatus::Satisfied) {
                let _ = writeln!(
                    out,
                    "  secondary {}: expected {}, got {}",
                    secondary.item_label, count.expected, count.observed
                );
            }
        }

        for violation in self.violating_items.iter().take(max_violations) {
            let _ = writeln!(out, "  - {}", violation.describe());
        }
        if self.violating_items.len() > max_violations {
            let _ = writeln!(
                out,
                "  ... and {} more violation(s)",
                self.violating_items.len() - max_violations
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Operator;
    use serde_json::json;

    fn stars_violation(stars: i64) -> Violation {
        Violation {
            item: ResultItem::from_value(json!({"full_name": "octo/low", "stargazers_count": stars})).unwrap(),
            predicate: Predicate::new("stars", Operator::GreaterThan, 5000_i64).unwrap(),
            observed: Some(json!(stars)),
        }
    }

    #[test]
    fn test_verdict_is_three_valued() {
        use PredicateStatus::{Satisfied, Unverifiable, Violated};
        assert_eq!(Verdict::from_statuses([Satisfied, Satisfied]), Verdict::Passed);
        assert_eq!(Verdict::from_statuses([Satisfied, Unverifiable]), Verdict::Inconclusive);
        assert_eq!(Verdict::from_statuses([Unverifiable, Violated]), Verdict::Failed);
        assert_eq!(Verdict::from_statuses([]), Verdict::Passed);
    }

    #[test]
    fn test_count_expectations() {
        assert_eq!(CountExpectation::Empty.check(0).status, PredicateStatus::Satisfied);
        assert_eq!(CountExpectation::Exactly(1).check(2).status, PredicateStatus::Violated);
        assert_eq!(CountExpectation::AtLeast(1).check(3).status, PredicateStatus::Satisfied);
    }

    #[test]
    fn test_error_fails_outcome() {
        let mut outcome = VerificationOutcome::new("errored", SearchTarget::Repositories, false);
        outcome.error = Some(OutcomeError::from(&VerifyError::Cancelled("stop".into())));
        outcome.conclude();
        assert_eq!(outcome.verdict, Verdict::Failed);
        assert!(!outcome.satisfied());
    }

    #[test]
    fn test_error_keeps_structured_context() {
        let err = VerifyError::RateLimitExhausted {
            url: "https://api.github.com/search/users".to_string(),
            page: 2,
        };
        let recorded = OutcomeError::from(&err);

        assert_eq!(recorded.kind, "rate_limit_exhausted");
        assert_eq!(recorded.context.get("page"), Some(&json!(2)));
        assert_eq!(recorded.context.get("fatal"), Some(&json!(true)));
        assert!(!recorded.context.contains_key("type"));

        let serialized = serde_json::to_value(&recorded).unwrap();
        assert_eq!(serialized["context"]["url"], "https://api.github.com/search/users");
    }

    #[test]
    fn test_render_lists_query_and_violations() {
        let mut outcome = VerificationOutcome::new("stars above 5000", SearchTarget::Repositories, false);
        outcome.query = "stars:>5000".to_string();
        outcome.predicates.push(PredicateReport {
            predicate: Predicate::new("stars", Operator::GreaterThan, 5000_i64).unwrap(),
            status: PredicateStatus::Violated,
            checked_items: 3,
            violations: 3,
            reason: None,
        });
        outcome.violating_items = vec![stars_violation(4999), stars_violation(10), stars_violation(1)];
        outcome.conclude();

        let report = outcome.render(2);
        assert!(report.starts_with("[FAILED] stars above 5000"));
        assert!(report.contains("query: stars:>5000"));
        assert!(report.contains("octo/low has stars=4999, violating 'stars greaterThan 5000'"));
        assert!(report.contains("... and 1 more violation(s)"));
    }

    #[test]
    fn test_outcome_serializes() {
        let mut outcome = VerificationOutcome::new("empty", SearchTarget::Users, true);
        outcome.count = Some(CountExpectation::Empty.check(0));
        outcome.conclude();

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["verdict"], "passed");
        assert_eq!(value["count"]["expected"]["kind"], "empty");
        assert!(value.get("error").is_none());
    }
}
