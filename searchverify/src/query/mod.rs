//! Query construction.
//!
//! Turns an ordered set of predicates into the provider's query syntax and
//! back.

mod spec;
mod translate;

pub use spec::{QuerySpec, QuerySpecBuilder, SearchTarget, SortDirection, SortSpec};
pub use translate::{parse, predicate_token, translate, ParsedToken};
