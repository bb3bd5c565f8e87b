//! Re-checks predicates against returned items.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use super::outcome::{OrderingReport, PredicateReport, PredicateStatus, Violation};
use crate::errors::VerifyError;
use crate::item::ResultItem;
use crate::predicate::{Extracted, Observed, Operator, Predicate};
use crate::query::{SortDirection, SortSpec};

/// Which items a predicate is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Every returned item.
    #[default]
    All,
    /// One randomly chosen item. A seed makes the choice reproducible.
    Representative {
        /// RNG seed.
        seed: Option<u64>,
    },
}

/// How a broken sort order is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortCheck {
    /// Not checked.
    Off,
    /// Out-of-order items make the check unverifiable.
    #[default]
    Advisory,
    /// Out-of-order items fail the case.
    Strict,
}

/// Explicit relaxations of the universal check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Item sampling.
    #[serde(default)]
    pub sampling: Sampling,
    /// Report fields absent from every checked item as unverifiable instead of failing.
    #[serde(default)]
    pub best_effort: bool,
    /// Sort-order handling.
    #[serde(default)]
    pub sort_check: SortCheck,
}

impl ValidationPolicy {
    /// Checks one random item instead of all.
    #[must_use]
    pub const fn representative(mut self, seed: Option<u64>) -> Self {
        self.sampling = Sampling::Representative { seed };
        self
    }

    /// Enables best-effort mode.
    #[must_use]
    pub const fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    /// Sets the sort check.
    #[must_use]
    pub const fn with_sort_check(mut self, check: SortCheck) -> Self {
        self.sort_check = check;
        self
    }
}

/// Predicate results plus every violation, in item order.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// One report per predicate, in declaration order.
    pub predicates: Vec<PredicateReport>,
    /// Every violating (item, predicate) pair.
    pub violations: Vec<Violation>,
}

/// Evaluates predicates over result items.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    policy: ValidationPolicy,
}

impl Validator {
    /// Creates a validator with a policy.
    #[must_use]
    pub const fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Checks every predicate against the items.
    ///
    /// Item-level predicates must hold for every sampled item; an empty batch
    /// satisfies them vacuously. Collection-level predicates quantify over
    /// the whole batch. Mismatches are collected, never short-circuited.
    pub fn validate<'p>(
        &self,
        items: &[ResultItem],
        predicates: impl IntoIterator<Item = &'p Predicate>,
    ) -> ValidationReport {
        let sample = self.sample(items);
        let mut report = ValidationReport::default();

        for predicate in predicates {
            let (summary, violations) = if predicate.operator().is_collection_level() {
                self.check_collection(items, predicate)
            } else {
                self.check_each(&sample, predicate)
            };
            debug!(
                predicate = %predicate,
                status = %summary.status,
                checked = summary.checked_items,
                violations = summary.violations,
                "Predicate checked"
            );
            report.predicates.push(summary);
            report.violations.extend(violations);
        }
        report
    }

    fn sample<'a>(&self, items: &'a [ResultItem]) -> Vec<&'a ResultItem> {
        match self.policy.sampling {
            Sampling::All => items.iter().collect(),
            Sampling::Representative { .. } if items.is_empty() => Vec::new(),
            Sampling::Representative { seed } => {
                let index = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed).gen_range(0..items.len()),
                    None => rand::thread_rng().gen_range(0..items.len()),
                };
                vec![&items[index]]
            }
        }
    }

    fn check_each(&self, items: &[&ResultItem], predicate: &Predicate) -> (PredicateReport, Vec<Violation>) {
        let mut violations = Vec::new();
        let mut absent = Vec::new();

        let Some(def) = predicate.def() else {
            return (report(predicate, PredicateStatus::Satisfied, 0, 0, None), violations);
        };

        for item in items {
            match def.extract(item) {
                Extracted::Absent => absent.push(*item),
                Extracted::Null => violations.push(violation(item, predicate, Some(serde_json::Value::Null))),
                Extracted::Value(observed) => {
                    if !predicate.operator().evaluate(def.field_type, &observed, predicate.value()) {
                        violations.push(violation(item, predicate, Some(observed.to_json())));
                    }
                }
            }
        }

        let checked = items.len() - absent.len();
        if self.policy.best_effort {
            if !violations.is_empty() {
                let count = violations.len();
                return (report(predicate, PredicateStatus::Violated, checked, count, None), violations);
            }
            if !items.is_empty() && checked == 0 {
                let reason = absent_everywhere(def.name);
                return (report(predicate, PredicateStatus::Unverifiable, 0, 0, Some(reason)), violations);
            }
            return (report(predicate, PredicateStatus::Satisfied, checked, 0, None), violations);
        }

        for item in absent {
            violations.push(violation(item, predicate, None));
        }
        let status = if violations.is_empty() {
            PredicateStatus::Satisfied
        } else {
            PredicateStatus::Violated
        };
        let count = violations.len();
        (report(predicate, status, items.len(), count, None), violations)
    }

    fn check_collection(&self, items: &[ResultItem], predicate: &Predicate) -> (PredicateReport, Vec<Violation>) {
        let Some(def) = predicate.def() else {
            return (report(predicate, PredicateStatus::Satisfied, 0, 0, None), Vec::new());
        };

        let mut matching = Vec::new();
        let mut absent = 0;
        for item in items {
            match def.extract(item) {
                Extracted::Absent => absent += 1,
                Extracted::Null => {}
                Extracted::Value(observed) => {
                    if predicate.operator().evaluate(def.field_type, &observed, predicate.value()) {
                        matching.push((item, observed));
                    }
                }
            }
        }

        if self.policy.best_effort && !items.is_empty() && absent == items.len() {
            let reason = absent_everywhere(def.name);
            return (report(predicate, PredicateStatus::Unverifiable, 0, 0, Some(reason)), Vec::new());
        }

        match predicate.operator() {
            Operator::AnyItemHas if matching.is_empty() => {
                let reason = format!("none of {} item(s) has {} {}", items.len(), def.name, predicate.value());
                (report(predicate, PredicateStatus::Violated, items.len(), 0, Some(reason)), Vec::new())
            }
            Operator::NoItemHas if !matching.is_empty() => {
                let violations: Vec<Violation> = matching
                    .into_iter()
                    .map(|(item, observed)| violation(item, predicate, Some(observed.to_json())))
                    .collect();
                let count = violations.len();
                (report(predicate, PredicateStatus::Violated, items.len(), count, None), violations)
            }
            _ => (report(predicate, PredicateStatus::Satisfied, items.len(), 0, None), Vec::new()),
        }
    }

    /// Checks that items follow the requested sort.
    ///
    /// Returns `None` when the check is off or the sort key has no ordered
    /// field. Items missing the value are skipped. Ties are in order.
    #[must_use]
    pub fn check_order(&self, items: &[ResultItem], sort: &SortSpec) -> Option<OrderingReport> {
        if self.policy.sort_check == SortCheck::Off {
            return None;
        }
        let def = sort.field().filter(|def| def.is_ordered())?;

        let values: Vec<(usize, Observed)> = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match def.extract(item) {
                Extracted::Value(v) => Some((i, v)),
                _ => None,
            })
            .collect();

        let breaks: Vec<(usize, usize)> = values
            .windows(2)
            .filter_map(|pair| {
                let (a_idx, a) = &pair[0];
                let (b_idx, b) = &pair[1];
                let ordering = order(a, b)?;
                let broken = match sort.direction {
                    SortDirection::Asc => ordering == Ordering::Greater,
                    SortDirection::Desc => ordering == Ordering::Less,
                };
                broken.then_some((*a_idx, *b_idx))
            })
            .collect();

        let status = match (breaks.is_empty(), self.policy.sort_check) {
            (true, _) => PredicateStatus::Satisfied,
            (false, SortCheck::Strict) => PredicateStatus::Violated,
            (false, _) => PredicateStatus::Unverifiable,
        };
        Some(OrderingReport {
            key: sort.key.clone(),
            direction: sort.direction,
            breaks,
            status,
        })
    }
}

fn order(a: &Observed, b: &Observed) -> Option<Ordering> {
    match (a, b) {
        (Observed::Number(a), Observed::Number(b)) => a.partial_cmp(b),
        (Observed::Text(a), Observed::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn absent_everywhere(field: &str) -> String {
    VerifyError::unverifiable(field, "absent from every checked item").to_string()
}

fn report(
    predicate: &Predicate,
    status: PredicateStatus,
    checked_items: usize,
    violations: usize,
    reason: Option<String>,
) -> PredicateReport {
    PredicateReport {
        predicate: predicate.clone(),
        status,
        checked_items,
        violations,
        reason,
    }
}

fn violation(item: &ResultItem, predicate: &Predicate, observed: Option<serde_json::Value>) -> Violation {
    Violation {
        item: item.clone(),
        predicate: predicate.clone(),
        observed,
    }
}
