//! Runs cases end to end.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::definition::VerificationCase;
use super::state::CaseState;
use crate::cancellation::CancellationToken;
use crate::config::HarnessConfig;
use crate::errors::Result;
use crate::executor::{FetchExecutor, RateLimitGate, Transport};
use crate::predicate::Target;
use crate::secondary::SecondaryResolver;
use crate::validate::{Validator, Verdict, VerificationOutcome};

/// Executes verification cases against one transport.
///
/// Every case run through the same harness shares its rate-limit gate.
#[derive(Debug, Clone)]
pub struct Harness {
    config: Arc<HarnessConfig>,
    executor: Arc<FetchExecutor>,
    resolver: SecondaryResolver,
}

impl Harness {
    /// Creates a harness backed by reqwest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VerifyError::Config`] for an invalid configuration or
    /// an HTTP client that cannot be built.
    #[cfg(feature = "http")]
    pub fn new(config: HarnessConfig) -> Result<Self> {
        let transport = crate::executor::ReqwestTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a harness over any transport.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VerifyError::Config`] for an invalid configuration.
    pub fn with_transport(config: HarnessConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let gate = Arc::new(RateLimitGate::new(config.max_rate_limit_wait()));
        let config = Arc::new(config);
        let executor = Arc::new(FetchExecutor::new(&config, transport, gate));
        let resolver = SecondaryResolver::new(executor.clone(), config.clone());
        Ok(Self {
            config,
            executor,
            resolver,
        })
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The shared rate-limit gate.
    #[must_use]
    pub fn gate(&self) -> &Arc<RateLimitGate> {
        self.executor.gate()
    }

    /// Runs one case to a verdict.
    ///
    /// Never fails: a fatal error ends the case and is recorded on the
    /// outcome, which then counts as failed.
    pub async fn run(&self, case: &VerificationCase, cancel: &CancellationToken) -> VerificationOutcome {
        let spec = case.spec();
        let mut outcome = VerificationOutcome::new(case.name(), spec.target(), spec.authenticated());
        let mut state = CaseState::Built;

        let result = match self.drive(case, cancel, &mut outcome, &mut state).await {
            Ok(()) => state.advance(CaseState::Concluded),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(case = case.name(), state = %state, error = %e, "Case aborted");
            outcome.error = Some((&e).into());
            state.abort();
        }
        outcome.conclude();

        info!(
            case = case.name(),
            verdict = %outcome.verdict,
            items = outcome.item_count,
            pages = outcome.page_count,
            violations = outcome.violating_items.len(),
            "Case concluded"
        );
        if outcome.verdict != Verdict::Passed {
            debug!(case = case.name(), report = %outcome.render(self.config.max_reported_violations));
        }
        outcome
    }

    async fn drive(
        &self,
        case: &VerificationCase,
        cancel: &CancellationToken,
        outcome: &mut VerificationOutcome,
        state: &mut CaseState,
    ) -> Result<()> {
        let spec = case.spec();

        outcome.query = spec.query().to_string();
        state.advance(CaseState::Translated)?;

        let mut limits = self.executor.limits();
        if let Some(max_items) = case.max_items() {
            limits = limits.with_max_items(max_items);
        }
        let fetched = self.executor.execute(spec, limits, cancel).await?;
        outcome.http_status = fetched.http_status;
        outcome.page_count = fetched.pages_fetched;
        outcome.item_count = fetched.items.len();
        outcome.total_count = fetched.total_count;
        if fetched.incomplete_results {
            warn!(case = case.name(), "Provider flagged results as incomplete");
        }
        state.advance(CaseState::Fetched)?;

        let validator = Validator::new(*case.policy());
        let checked = validator.validate(&fetched.items, spec.checked_predicates(Target::Primary));
        outcome.predicates = checked.predicates;
        outcome.violating_items = checked.violations;
        if let Some(sort) = spec.sort() {
            outcome.ordering = validator.check_order(&fetched.items, sort);
        }
        if let Some(expectation) = case.expectation() {
            let observed = fetched.total_count.unwrap_or(fetched.items.len() as u64);
            outcome.count = Some(expectation.check(observed));
        }
        state.advance(CaseState::Validated)?;

        let Some(link) = case.secondary() else {
            return Ok(());
        };
        outcome.conclude();
        if outcome.verdict == Verdict::Failed {
            debug!(case = case.name(), "Primary checks failed, skipping secondary resolution");
            return Ok(());
        }

        let (reports, violations) = self
            .resolver
            .verify(
                &fetched.items,
                link,
                &case.secondary_predicates(),
                &validator,
                spec.authenticated(),
                cancel,
            )
            .await?;
        outcome.secondary = reports;
        outcome.violating_items.extend(violations);
        state.advance(CaseState::Resolved)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{Operator, Predicate};
    use crate::query::SearchTarget;
    use crate::testing::{assert_case_errored, assert_case_failed, assert_case_passed, fixtures, ScriptedTransport};

    fn harness(transport: Arc<ScriptedTransport>) -> Harness {
        Harness::with_transport(HarnessConfig::default(), transport).unwrap()
    }

    #[tokio::test]
    async fn test_run_records_metadata() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            "/search/repositories",
            fixtures::search_page(1, vec![fixtures::repo("big").stars(9000).build()]),
        ));
        let case = VerificationCase::builder("stars", SearchTarget::Repositories)
            .predicate(Predicate::new("stars", Operator::GreaterThan, 5000_i64))
            .build()
            .unwrap();

        let outcome = harness(transport).run(&case, &CancellationToken::new()).await;
        assert_case_passed(&outcome);
        assert_eq!(outcome.http_status, Some(200));
        assert_eq!(outcome.page_count, 1);
        assert_eq!(outcome.total_count, Some(1));
        assert!(outcome.finished_at >= outcome.started_at);
    }

    #[tokio::test]
    async fn test_rejected_request_errors_the_case() {
        let transport = Arc::new(
            ScriptedTransport::new().respond("/search", crate::executor::HttpResponse::new(422, "Validation Failed")),
        );
        let case = VerificationCase::builder("bad query", SearchTarget::Repositories)
            .keyword("x")
            .build()
            .unwrap();

        let outcome = harness(transport).run(&case, &CancellationToken::new()).await;
        assert_case_failed(&outcome);
        assert_case_errored(&outcome, "request_rejected");
        assert!(outcome.render(10).contains("Validation Failed"));
    }

    #[tokio::test]
    async fn test_failed_primary_skips_secondary() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            "/search/repositories",
            fixtures::search_page(1, vec![fixtures::repo("nothing-here").build()]),
        ));
        let case = VerificationCase::builder("readme", SearchTarget::Repositories)
            .predicate(Predicate::contains("name", "cadmio"))
            .secondary_predicate(Predicate::contains("readme", "cadmio"))
            .follow(crate::secondary::SecondaryLink::readme())
            .build()
            .unwrap();

        let outcome = harness(transport.clone()).run(&case, &CancellationToken::new()).await;
        assert_case_failed(&outcome);
        assert!(outcome.secondary.is_empty());
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = HarnessConfig::default().with_concurrency(0);
        assert!(Harness::with_transport(config, Arc::new(ScriptedTransport::new())).is_err());
    }
}
