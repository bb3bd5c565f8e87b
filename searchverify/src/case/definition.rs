//! Declarative verification cases.

use crate::errors::{Result, VerifyError};
use crate::predicate::{Predicate, Target};
use crate::query::{QuerySpec, QuerySpecBuilder, SearchTarget, SortDirection};
use crate::secondary::SecondaryLink;
use crate::validate::{CountExpectation, SortCheck, ValidationPolicy, VerificationOutcome};

/// One named scenario: a query, its expected predicates and an optional follow-up.
///
/// Everything is validated at construction, so a case that builds never
/// fails for translation reasons once it runs.
#[derive(Debug, Clone)]
pub struct VerificationCase {
    name: String,
    spec: QuerySpec,
    policy: ValidationPolicy,
    expect: Option<CountExpectation>,
    secondary: Option<SecondaryLink>,
    max_items: Option<usize>,
}

impl VerificationCase {
    /// Starts a builder.
    #[must_use]
    pub fn builder(name: impl Into<String>, target: SearchTarget) -> CaseBuilder {
        CaseBuilder::new(name, target)
    }

    /// Case name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compiled query.
    #[must_use]
    pub const fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Validation relaxations.
    #[must_use]
    pub const fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Expected result count.
    #[must_use]
    pub const fn expectation(&self) -> Option<CountExpectation> {
        self.expect
    }

    /// Follow-up link.
    #[must_use]
    pub const fn secondary(&self) -> Option<&SecondaryLink> {
        self.secondary.as_ref()
    }

    /// Item cap for pagination.
    #[must_use]
    pub const fn max_items(&self) -> Option<usize> {
        self.max_items
    }

    /// Secondary predicates in declaration order.
    #[must_use]
    pub fn secondary_predicates(&self) -> Vec<&Predicate> {
        self.spec.checked_predicates(Target::Secondary).collect()
    }

    /// A failed outcome for a case that never started.
    #[must_use]
    pub fn aborted(&self, error: &VerifyError) -> VerificationOutcome {
        let mut outcome = VerificationOutcome::new(&self.name, self.spec.target(), self.spec.authenticated());
        outcome.query = self.spec.query().to_string();
        outcome.error = Some(error.into());
        outcome.conclude();
        outcome
    }
}

/// Builder for [`VerificationCase`].
#[derive(Debug)]
pub struct CaseBuilder {
    name: String,
    query: QuerySpecBuilder,
    policy: ValidationPolicy,
    expect: Option<CountExpectation>,
    secondary: Option<SecondaryLink>,
    max_items: Option<usize>,
}

impl CaseBuilder {
    /// Creates a builder for one endpoint.
    #[must_use]
    pub fn new(name: impl Into<String>, target: SearchTarget) -> Self {
        Self {
            name: name.into(),
            query: QuerySpec::builder(target),
            policy: ValidationPolicy::default(),
            expect: None,
            secondary: None,
            max_items: None,
        }
    }

    /// Appends a predicate. Errors surface from [`CaseBuilder::build`].
    #[must_use]
    pub fn predicate(mut self, predicate: Result<Predicate>) -> Self {
        self.query = self.query.predicate(predicate);
        self
    }

    /// Appends a bare keyword.
    #[must_use]
    pub fn keyword(self, text: &str) -> Self {
        self.predicate(Predicate::keyword(text))
    }

    /// Appends a predicate checked against the follow-up payload.
    #[must_use]
    pub fn secondary_predicate(self, predicate: Result<Predicate>) -> Self {
        self.predicate(predicate.map(Predicate::secondary))
    }

    /// Sets the sort.
    #[must_use]
    pub fn sort(mut self, key: &str, direction: SortDirection) -> Self {
        self.query = self.query.sort(key, direction);
        self
    }

    /// Runs authenticated.
    #[must_use]
    pub fn authenticated(mut self, authenticated: bool) -> Self {
        self.query = self.query.authenticated(authenticated);
        self
    }

    /// Replaces the validation policy.
    #[must_use]
    pub const fn policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reports absent fields as unverifiable.
    #[must_use]
    pub const fn best_effort(mut self) -> Self {
        self.policy = self.policy.best_effort();
        self
    }

    /// Checks one sampled item.
    #[must_use]
    pub const fn representative(mut self, seed: Option<u64>) -> Self {
        self.policy = self.policy.representative(seed);
        self
    }

    /// Sets the sort-order check.
    #[must_use]
    pub const fn sort_check(mut self, check: SortCheck) -> Self {
        self.policy = self.policy.with_sort_check(check);
        self
    }

    /// Declares the expected result count.
    #[must_use]
    pub const fn expect(mut self, expectation: CountExpectation) -> Self {
        self.expect = Some(expectation);
        self
    }

    /// Follows a secondary link.
    #[must_use]
    pub fn follow(mut self, link: SecondaryLink) -> Self {
        self.secondary = Some(link);
        self
    }

    /// Caps collected items.
    #[must_use]
    pub const fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Validates and compiles the case.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::UnsupportedPredicate`] for invalid or
    /// untranslatable predicates, and [`VerifyError::Config`] when secondary
    /// predicates and the follow-up link do not come together.
    pub fn build(self) -> Result<VerificationCase> {
        let spec = self.query.build()?;

        let has_secondary = spec.checked_predicates(Target::Secondary).next().is_some();
        let counts_secondary = self.secondary.as_ref().is_some_and(|l| l.expected_count().is_some());
        match (&self.secondary, has_secondary || counts_secondary) {
            (None, true) => {
                return Err(VerifyError::Config(format!(
                    "case '{}' has secondary predicates but no follow-up link",
                    self.name
                )));
            }
            (Some(link), false) => {
                return Err(VerifyError::Config(format!(
                    "case '{}' follows {} but checks nothing there",
                    self.name,
                    link.kind()
                )));
            }
            _ => {}
        }

        Ok(VerificationCase {
            name: self.name,
            spec,
            policy: self.policy,
            expect: self.expect,
            secondary: self.secondary,
            max_items: self.max_items,
        })
    }
}
