//! The HTTP boundary.
//!
//! The executor only builds requests and interprets responses; sending them
//! is the job of a [`Transport`]. A reqwest-backed implementation is
//! provided behind the `http` feature, and tests plug in scripted ones.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::errors::VerifyError;

/// A `GET` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL without query string.
    pub url: String,
    /// Query parameters in order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Creates a request for a URL.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Adds query parameters.
    #[must_use]
    pub fn with_query(mut self, params: Vec<(String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Looks up a query parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Looks up a header, case-insensitively.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as seen by the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Headers with lower-cased names.
    pub headers: HashMap<String, String>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with a status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header. Names are stored lower-cased.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    /// Looks up a header by lower-cased name.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends HTTP requests.
///
/// Implementations report timeouts and connection failures as
/// [`VerifyError::TransientNetwork`]; any HTTP status, including errors, is
/// returned as an [`HttpResponse`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a `GET`.
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, VerifyError>;
}

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::{HttpRequest, HttpResponse, Transport};
    use crate::config::HarnessConfig;
    use crate::errors::VerifyError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tracing::debug;

    /// [`Transport`] backed by a `reqwest::Client`.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Builds a client with the configured timeout and user agent.
        pub fn new(config: &HarnessConfig) -> Result<Self, VerifyError> {
            let client = reqwest::Client::builder()
                .user_agent(config.user_agent.clone())
                .timeout(config.timeout())
                .build()
                .map_err(|e| VerifyError::Config(format!("failed to build HTTP client: {e}")))?;
            Ok(Self { client })
        }

        /// Wraps an existing client.
        #[must_use]
        pub const fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, VerifyError> {
            let mut builder = self.client.get(&request.url).query(&request.query);
            for (key, value) in &request.headers {
                builder = builder.header(key, value);
            }

            let response = builder.send().await.map_err(|e| {
                debug!(url = %request.url, error = %e, "Request failed before a response");
                VerifyError::transient(e.to_string())
            })?;

            let status = response.status().as_u16();
            let headers: HashMap<String, String> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            let body = response
                .text()
                .await
                .map_err(|e| VerifyError::transient(format!("failed to read body: {e}")))?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_lookup() {
        let request = HttpRequest::get("https://api.github.com/search/repositories")
            .with_query(vec![("q".into(), "stars:>5000".into())])
            .with_header("Authorization", "token abc");

        assert_eq!(request.param("q"), Some("stars:>5000"));
        assert_eq!(request.header("authorization"), Some("token abc"));
        assert_eq!(request.param("page"), None);
    }

    #[test]
    fn test_response_headers_are_case_insensitive() {
        let response = HttpResponse::new(403, "").with_header("X-RateLimit-Remaining", "0");
        assert_eq!(response.header("x-ratelimit-remaining"), Some("0"));
        assert_eq!(response.header("X-RATELIMIT-REMAINING"), Some("0"));
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_mock_transport() {
        let mut mock = MockTransport::new();
        mock.expect_get()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let response = mock.get(&HttpRequest::get("https://example.com")).await.unwrap();
        assert!(response.is_success());
    }
}
