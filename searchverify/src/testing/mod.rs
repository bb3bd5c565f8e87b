//! Testing utilities for verification cases.
//!
//! This module provides:
//! - A scripted in-memory transport
//! - Fixture builders for provider payloads
//! - Assertions on verification outcomes

mod assertions;
pub mod fixtures;
mod mocks;

pub use assertions::{
    assert_case_errored, assert_case_failed, assert_case_inconclusive, assert_case_passed,
    assert_predicate_status, assert_verdict, assert_violation_count,
};
pub use mocks::ScriptedTransport;
