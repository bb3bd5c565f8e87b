//! In-memory transports for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::errors::VerifyError;
use crate::executor::{HttpRequest, HttpResponse, Transport};

type Reply = Result<HttpResponse, VerifyError>;

/// A transport that replays canned replies and records every request.
///
/// Replies are queued per URL pattern; a request takes the next reply of the
/// first pattern contained in its URL that still has one queued. A request
/// with nothing queued fails with [`VerifyError::Internal`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<Reply>)>>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    /// Creates a transport with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for URLs containing `pattern`.
    #[must_use]
    pub fn respond(self, pattern: &str, response: HttpResponse) -> Self {
        self.push(pattern, Ok(response));
        self
    }

    /// Queues a timeout for URLs containing `pattern`.
    #[must_use]
    pub fn timeout(self, pattern: &str) -> Self {
        self.push(pattern, Err(VerifyError::transient("operation timed out")));
        self
    }

    /// Queues an arbitrary error.
    #[must_use]
    pub fn fail(self, pattern: &str, error: VerifyError) -> Self {
        self.push(pattern, Err(error));
        self
    }

    /// Delays every reply.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queues a response after construction.
    pub fn enqueue(&self, pattern: &str, response: HttpResponse) {
        self.push(pattern, Ok(response));
    }

    fn push(&self, pattern: &str, reply: Reply) {
        let mut routes = self.routes.lock();
        if let Some((_, queue)) = routes.iter_mut().find(|(p, _)| p == pattern) {
            queue.push_back(reply);
        } else {
            routes.push((pattern.to_string(), VecDeque::from([reply])));
        }
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of requests whose URL contains `pattern`.
    #[must_use]
    pub fn requests_to(&self, pattern: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(pattern))
            .count()
    }

    /// Replies still queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.routes.lock().iter().map(|(_, q)| q.len()).sum()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, VerifyError> {
        self.requests.lock().push(request.clone());

        let reply = {
            let mut routes = self.routes.lock();
            routes
                .iter_mut()
                .find(|(pattern, queue)| request.url.contains(pattern.as_str()) && !queue.is_empty())
                .and_then(|(_, queue)| queue.pop_front())
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        reply.unwrap_or_else(|| {
            Err(VerifyError::Internal(format!(
                "no scripted response for {}",
                request.url
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_per_pattern() {
        let transport = ScriptedTransport::new()
            .respond("/search", HttpResponse::new(200, "first"))
            .respond("/issues", HttpResponse::new(200, "issues"))
            .respond("/search", HttpResponse::new(200, "second"));

        let search = HttpRequest::get("https://api.github.com/search/repositories");
        assert_eq!(transport.get(&search).await.unwrap().body, "first");
        assert_eq!(transport.get(&search).await.unwrap().body, "second");
        assert!(transport.get(&search).await.is_err());

        let issues = HttpRequest::get("https://api.github.com/repos/o/r/issues");
        assert_eq!(transport.get(&issues).await.unwrap().body, "issues");
        assert_eq!(transport.request_count(), 4);
        assert_eq!(transport.requests_to("/search"), 3);
        assert_eq!(transport.pending(), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let transport = ScriptedTransport::new().timeout("/search");
        let err = transport
            .get(&HttpRequest::get("https://api.github.com/search/users"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
