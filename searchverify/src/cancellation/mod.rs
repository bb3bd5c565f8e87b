//! Cooperative cancellation for running cases.

mod token;

pub use token::{CancelCallback, CancellationToken};
