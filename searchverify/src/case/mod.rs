//! Verification cases: definition, execution and suites.
//!
//! This module provides:
//! - `VerificationCase` and its builder
//! - The `Harness` that drives one case through its lifecycle
//! - The `Suite` runner with bounded parallelism

mod definition;
mod harness;
mod state;
mod suite;


pub use definition::{CaseBuilder, VerificationCase};
pub use harness::Harness;
pub use state::CaseState;
pub use suite::{Suite, SuiteReport};
