//! Request execution: transport, pagination, rate limiting and retries.

mod fetch;
pub mod rate_limit;
mod retry;
mod transport;

pub use fetch::{FetchExecutor, FetchOutcome, PageLimits};
pub use rate_limit::RateLimitGate;
pub use retry::{JitterStrategy, RetryConfig, RetryDecision, RetryState};
pub use transport::{HttpRequest, HttpResponse, Transport};

#[cfg(feature = "http")]
pub use transport::ReqwestTransport;

#[cfg(test)]
pub use transport::MockTransport;
