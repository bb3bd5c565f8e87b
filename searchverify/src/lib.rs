//! # Searchverify
//!
//! A contract-verification harness for paginated, filter-driven search APIs.
//!
//! A verification case declares a query as a list of typed predicates, sends
//! it to the provider, collects every page and then re-checks each returned
//! item against the same predicates. The harness supports:
//!
//! - **Typed predicates**: a field catalog decides which operators and values are valid
//! - **Query translation**: predicates render to the provider's query syntax and parse back
//! - **Rate-limit aware fetching**: one shared gate, bounded retries and backoff
//! - **Secondary resolution**: follow README, issues or resource links and check them too
//! - **Three-valued verdicts**: passed, failed or inconclusive, never a silent pass
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use searchverify::prelude::*;
//!
//! let case = VerificationCase::builder("stars", SearchTarget::Repositories)
//!     .predicate(Predicate::new("stars", Operator::GreaterThan, 5000_i64))
//!     .sort("stars", SortDirection::Asc)
//!     .build()?;
//!
//! let harness = Harness::new(HarnessConfig::from_env()?)?;
//! let report = Suite::new(harness).case(case).run().await;
//! std::process::exit(report.exit_code(false));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod case;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod executor;
pub mod item;
pub mod predicate;
pub mod query;
pub mod secondary;
pub mod telemetry;
pub mod testing;
pub mod validate;

pub use errors::{Result, VerifyError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::case::{CaseBuilder, Harness, Suite, SuiteReport, VerificationCase};
    pub use crate::config::HarnessConfig;
    pub use crate::errors::{Result, VerifyError};
    pub use crate::executor::{HttpRequest, HttpResponse, Transport};
    pub use crate::item::{FieldValue, ResultItem};
    pub use crate::predicate::{Operator, Predicate, PredicateValue};
    pub use crate::query::{QuerySpec, SearchTarget, SortDirection};
    pub use crate::secondary::{FollowUp, SecondaryLink};
    pub use crate::telemetry::init_tracing;
    pub use crate::validate::{
        CountExpectation, PredicateStatus, SortCheck, ValidationPolicy, Verdict,
        VerificationOutcome, Violation,
    };
}
