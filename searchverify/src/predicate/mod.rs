//! Predicates: the conditions a search result must satisfy.
//!
//! This module provides:
//! - The field catalog mapping filter names to JSON paths and query syntax
//! - The operator table and its evaluation rules
//! - The validated `Predicate` type

mod condition;
pub mod field;
mod operator;

pub use condition::{Predicate, Target};
pub use field::{Derivation, Extracted, FieldDef, FieldType, Observed, QuerySyntax};
pub use operator::{Operator, PredicateValue};
