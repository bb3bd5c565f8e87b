//! Result validation and outcome reporting.

mod outcome;
mod validator;

pub use outcome::{
    CountExpectation, CountReport, OrderingReport, OutcomeError, PredicateReport,
    PredicateStatus, SecondaryReport, Verdict, VerificationOutcome, Violation,
};
pub use validator::{Sampling, SortCheck, ValidationPolicy, ValidationReport, Validator};
