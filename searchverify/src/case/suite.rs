//! Bounded-parallel execution of many cases.

use futures::future::join_all;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::definition::VerificationCase;
use super::harness::Harness;
use crate::cancellation::CancellationToken;
use crate::errors::VerifyError;
use crate::validate::{Verdict, VerificationOutcome};

/// Runs cases in parallel, at most `concurrency` at a time.
///
/// Cases share the harness rate-limit gate and one cancellation token.
/// Cancelling stops cases that have not started and interrupts running ones
/// before their next page.
#[derive(Debug)]
pub struct Suite {
    harness: Arc<Harness>,
    cases: Vec<Arc<VerificationCase>>,
    cancel: Arc<CancellationToken>,
    slots: Arc<Semaphore>,
}

impl Suite {
    /// Creates an empty suite.
    #[must_use]
    pub fn new(harness: Harness) -> Self {
        let cancel = Arc::new(CancellationToken::new());
        let slots = Arc::new(Semaphore::new(harness.config().concurrency.max(1)));
        {
            let slots = slots.clone();
            cancel.on_cancel(move || slots.close());
        }
        Self {
            harness: Arc::new(harness),
            cases: Vec::new(),
            cancel,
            slots,
        }
    }

    /// Adds a case.
    #[must_use]
    pub fn case(mut self, case: VerificationCase) -> Self {
        self.cases.push(Arc::new(case));
        self
    }

    /// Adds several cases.
    #[must_use]
    pub fn cases(mut self, cases: impl IntoIterator<Item = VerificationCase>) -> Self {
        self.cases.extend(cases.into_iter().map(Arc::new));
        self
    }

    /// Number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Whether the suite has no cases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// The token that cancels this suite.
    #[must_use]
    pub fn cancel_token(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Runs every case and collects outcomes in declaration order.
    pub async fn run(&self) -> SuiteReport {
        let limit = self.harness.config().concurrency.max(1);
        info!(cases = self.cases.len(), concurrency = limit, "Running suite");

        let handles: Vec<_> = self
            .cases
            .iter()
            .map(|case| {
                let case = case.clone();
                let harness = self.harness.clone();
                let cancel = self.cancel.clone();
                let slots = self.slots.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = slots.acquire_owned().await else {
                        let reason = cancel.reason().unwrap_or_else(|| "suite cancelled".to_string());
                        return case.aborted(&VerifyError::Cancelled(reason));
                    };
                    harness.run(&case, &cancel).await
                })
            })
            .collect();

        let outcomes: Vec<VerificationOutcome> = join_all(handles)
            .await
            .into_iter()
            .zip(&self.cases)
            .map(|(joined, case)| {
                joined.unwrap_or_else(|e| {
                    error!(case = case.name(), error = %e, "Case task panicked");
                    case.aborted(&VerifyError::Internal(format!("case task failed: {e}")))
                })
            })
            .collect();

        let report = SuiteReport::from_outcomes(outcomes);
        info!(
            passed = report.passed,
            failed = report.failed,
            inconclusive = report.inconclusive,
            errored = report.errored,
            "Suite finished"
        );
        report
    }
}

/// Aggregated suite result.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// One outcome per case, in declaration order.
    pub outcomes: Vec<VerificationOutcome>,
    /// Cases that passed.
    pub passed: usize,
    /// Cases that failed, errored cases included.
    pub failed: usize,
    /// Cases that were inconclusive.
    pub inconclusive: usize,
    /// Cases aborted by a fatal error.
    pub errored: usize,
}

impl SuiteReport {
    /// Tallies outcomes.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<VerificationOutcome>) -> Self {
        let count = |verdict: Verdict| outcomes.iter().filter(|o| o.verdict == verdict).count();
        let passed = count(Verdict::Passed);
        let failed = count(Verdict::Failed);
        let inconclusive = count(Verdict::Inconclusive);
        let errored = outcomes.iter().filter(|o| o.errored()).count();
        Self {
            outcomes,
            passed,
            failed,
            inconclusive,
            errored,
        }
    }

    /// Process exit code: 0 only with no failures, and with no
    /// inconclusive cases when `strict`.
    #[must_use]
    pub const fn exit_code(&self, strict: bool) -> i32 {
        if self.failed > 0 || (strict && self.inconclusive > 0) {
            1
        } else {
            0
        }
    }

    /// Looks up an outcome by case name.
    #[must_use]
    pub fn outcome(&self, case_name: &str) -> Option<&VerificationOutcome> {
        self.outcomes.iter().find(|o| o.case_name == case_name)
    }

    /// Summary line followed by the report of every case that did not pass.
    #[must_use]
    pub fn render(&self, max_violations: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} passed, {} failed ({} errored), {} inconclusive",
            self.passed, self.failed, self.errored, self.inconclusive
        );
        for outcome in self.outcomes.iter().filter(|o| !o.satisfied()) {
            out.push_str(&outcome.render(max_violations));
        }
        out
    }
}
