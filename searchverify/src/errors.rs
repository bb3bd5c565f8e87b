//! Error types for the verification harness.
//!
//! Errors fall into three groups: construction-time errors that stop a case
//! before any network I/O, execution-time errors that abort the current case
//! only, and the non-fatal [`VerifyError::Unverifiable`] that downgrades a
//! predicate to inconclusive.

use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for verification operations.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// A predicate has no valid meaning or no textual query form.
    #[error("Unsupported predicate '{field} {operator}': {reason}")]
    UnsupportedPredicate {
        /// The field the predicate targets (`<free text>` for bare keywords).
        field: String,
        /// The operator name.
        operator: String,
        /// Why the combination was rejected.
        reason: String,
    },

    /// The provider rejected the request with a non-retryable 4xx status.
    #[error("Request rejected with status {status} for {url}: {body}")]
    RequestRejected {
        /// HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
        /// Response body as returned by the provider.
        body: String,
    },

    /// A page was rate limited twice in a row.
    #[error("Rate limit exhausted on page {page} of {url}")]
    RateLimitExhausted {
        /// The requested URL.
        url: String,
        /// The 1-based page number.
        page: u32,
    },

    /// Timeouts, connection failures and 5xx responses after all retries.
    #[error("Transient network error after {attempts} attempt(s): {message}")]
    TransientNetwork {
        /// Number of attempts made.
        attempts: usize,
        /// Description of the last failure.
        message: String,
    },

    /// A predicate could not be checked because its data is structurally absent.
    #[error("Unverifiable predicate on '{field}': {reason}")]
    Unverifiable {
        /// The field that could not be checked.
        field: String,
        /// Why it could not be checked.
        reason: String,
    },

    /// The case was cancelled between page requests.
    #[error("Case cancelled: {0}")]
    Cancelled(String),

    /// A response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid harness configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A broken internal invariant, such as an out-of-order case transition.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for VerifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl VerifyError {
    /// Creates an unsupported predicate error.
    #[must_use]
    pub fn unsupported(
        field: impl Into<String>,
        operator: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedPredicate {
            field: field.into(),
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unverifiable predicate error.
    #[must_use]
    pub fn unverifiable(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unverifiable {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a single-attempt transient error, as produced by a transport.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetwork {
            attempts: 1,
            message: message.into(),
        }
    }

    /// Stable snake-case code for reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedPredicate { .. } => "unsupported_predicate",
            Self::RequestRejected { .. } => "request_rejected",
            Self::RateLimitExhausted { .. } => "rate_limit_exhausted",
            Self::TransientNetwork { .. } => "transient_network",
            Self::Unverifiable { .. } => "unverifiable_predicate",
            Self::Cancelled(_) => "cancelled",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
            Self::Io(_) => "io",
        }
    }

    /// Whether the error aborts the case it occurred in.
    ///
    /// Only [`VerifyError::Unverifiable`] is non-fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Unverifiable { .. })
    }

    /// Whether the executor may retry the request that produced this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), json!(self.kind()));
        map.insert("message".to_string(), json!(self.to_string()));
        map.insert("fatal".to_string(), json!(self.is_fatal()));

        match self {
            Self::UnsupportedPredicate { field, operator, .. } => {
                map.insert("field".to_string(), json!(field));
                map.insert("operator".to_string(), json!(operator));
            }
            Self::RequestRejected { status, url, .. } => {
                map.insert("status".to_string(), json!(status));
                map.insert("url".to_string(), json!(url));
            }
            Self::RateLimitExhausted { url, page } => {
                map.insert("url".to_string(), json!(url));
                map.insert("page".to_string(), json!(page));
            }
            Self::TransientNetwork { attempts, .. } => {
                map.insert("attempts".to_string(), json!(attempts));
            }
            Self::Unverifiable { field, .. } => {
                map.insert("field".to_string(), json!(field));
            }
            _ => {}
        }

        map
    }
}

/// Convenience result alias.
pub type Result<T, E = VerifyError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unverifiable_is_non_fatal() {
        assert!(!VerifyError::unverifiable("followers", "absent").is_fatal());
        assert!(VerifyError::Cancelled("stop".into()).is_fatal());
        assert!(VerifyError::transient("timeout").is_fatal());
    }

    #[test]
    fn test_request_rejected_to_dict() {
        let err = VerifyError::RequestRejected {
            status: 422,
            url: "https://api.github.com/search/repositories".to_string(),
            body: "Validation Failed".to_string(),
        };
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "request_rejected");
        assert_eq!(dict.get("status").unwrap(), 422);
        assert!(err.to_string().contains("Validation Failed"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(VerifyError::transient("connection reset").is_transient());
        assert!(!VerifyError::Config("bad".into()).is_transient());
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: VerifyError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "serialization");
    }
}
