//! The paginated, rate-limited fetch executor.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::rate_limit::{rate_limit_wait, RateLimitGate};
use super::retry::{RetryConfig, RetryDecision, RetryState};
use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::cancellation::CancellationToken;
use crate::config::{HarnessConfig, CREDENTIAL_ENV};
use crate::errors::{Result, VerifyError};
use crate::item::ResultItem;
use crate::query::QuerySpec;

const ACCEPT: &str = "application/vnd.github+json";

/// Pagination bounds for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Highest page number requested.
    pub max_pages: u32,
    /// Items requested per page.
    pub page_size: u32,
    /// Stop once this many items are collected.
    pub max_items: Option<usize>,
}

impl PageLimits {
    /// Limits from the harness configuration.
    #[must_use]
    pub const fn from_config(config: &HarnessConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            page_size: config.page_size,
            max_items: None,
        }
    }

    /// Caps the number of collected items.
    #[must_use]
    pub const fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Overrides the page ceiling.
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// Items plus response metadata.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Items in page order.
    pub items: Vec<ResultItem>,
    /// `total_count` declared by the provider; `None` for plain collections.
    pub total_count: Option<u64>,
    /// Pages requested.
    pub pages_fetched: u32,
    /// Status of the last page.
    pub http_status: Option<u16>,
    /// Whether the provider flagged the results as incomplete.
    pub incomplete_results: bool,
    /// Pages the declared total implies but the limits left unfetched.
    pub remaining_pages: u32,
    /// Rate-limit budget after the last page.
    pub rate_limit_remaining: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    #[serde(default)]
    items: Vec<Value>,
}

/// Issues requests with authentication, retries and pagination.
pub struct FetchExecutor {
    transport: Arc<dyn Transport>,
    gate: Arc<RateLimitGate>,
    retry: RetryConfig,
    credential: Option<String>,
    api_base_url: String,
    limits: PageLimits,
    rate_limit_fallback: Duration,
}

impl std::fmt::Debug for FetchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchExecutor")
            .field("api_base_url", &self.api_base_url)
            .field("limits", &self.limits)
            .field("retry", &self.retry)
            .field("authenticated_available", &self.credential.is_some())
            .finish_non_exhaustive()
    }
}

impl FetchExecutor {
    /// Creates an executor sharing `gate` with every other executor of the run.
    #[must_use]
    pub fn new(config: &HarnessConfig, transport: Arc<dyn Transport>, gate: Arc<RateLimitGate>) -> Self {
        Self {
            transport,
            gate,
            retry: config.retry_config(),
            credential: config.credential.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            limits: PageLimits::from_config(config),
            rate_limit_fallback: Duration::from_millis(config.backoff_base_ms.max(1_000)),
        }
    }

    /// Default pagination limits.
    #[must_use]
    pub const fn limits(&self) -> PageLimits {
        self.limits
    }

    /// The shared rate-limit gate.
    #[must_use]
    pub const fn gate(&self) -> &Arc<RateLimitGate> {
        &self.gate
    }

    /// Runs a search query page by page.
    ///
    /// Stops at the declared total, at `limits.max_items`, at an empty page
    /// or at `limits.max_pages`, whichever comes first. Cancellation is
    /// checked before each page; a page that completes after cancellation
    /// is discarded.
    pub async fn execute(
        &self,
        spec: &QuerySpec,
        limits: PageLimits,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let url = format!("{}{}", self.api_base_url, spec.target().path());
        let mut outcome = FetchOutcome::default();

        for page in 1..=limits.max_pages {
            cancel.check()?;
            let request = self.authorize(
                HttpRequest::get(&url).with_query(spec.params(page, limits.page_size)),
                spec.authenticated(),
            )?;
            let response = self.send(&request, page).await?;
            cancel.check()?;

            let envelope: SearchEnvelope = serde_json::from_str(&response.body)?;
            debug!(
                query = spec.query(),
                page,
                status = response.status,
                items = envelope.items.len(),
                total_count = envelope.total_count,
                "Fetched search page"
            );

            outcome.pages_fetched = page;
            outcome.http_status = Some(response.status);
            outcome.total_count = Some(envelope.total_count);
            outcome.incomplete_results |= envelope.incomplete_results;

            if envelope.items.is_empty() {
                break;
            }
            if push_items(&mut outcome.items, envelope.items, limits.max_items)? {
                break;
            }
            if outcome.items.len() as u64 >= envelope.total_count {
                break;
            }
        }

        if let Some(total) = outcome.total_count {
            let total_pages = total.div_ceil(u64::from(limits.page_size.max(1)));
            outcome.remaining_pages =
                u32::try_from(total_pages.saturating_sub(u64::from(outcome.pages_fetched))).unwrap_or(u32::MAX);
        }
        outcome.rate_limit_remaining = self.gate.remaining();
        Ok(outcome)
    }

    /// Fetches a plain JSON array endpoint page by page (issue lists, follower lists).
    ///
    /// Stops at an empty or short page, or at the limits.
    pub async fn execute_collection(
        &self,
        url: &str,
        authenticated: bool,
        limits: PageLimits,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();

        for page in 1..=limits.max_pages {
            cancel.check()?;
            let params = vec![
                ("page".to_string(), page.to_string()),
                ("per_page".to_string(), limits.page_size.to_string()),
            ];
            let request = self.authorize(HttpRequest::get(url).with_query(params), authenticated)?;
            let response = self.send(&request, page).await?;
            cancel.check()?;

            let entries: Vec<Value> = serde_json::from_str(&response.body)?;
            debug!(url, page, items = entries.len(), "Fetched collection page");

            outcome.pages_fetched = page;
            outcome.http_status = Some(response.status);

            let short_page = entries.len() < limits.page_size as usize;
            if entries.is_empty() || push_items(&mut outcome.items, entries, limits.max_items)? || short_page {
                break;
            }
        }

        outcome.rate_limit_remaining = self.gate.remaining();
        Ok(outcome)
    }

    /// Fetches one resource with the same retry and rate-limit rules.
    pub async fn fetch_one(
        &self,
        url: &str,
        authenticated: bool,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        cancel.check()?;
        let request = self.authorize(HttpRequest::get(url), authenticated)?;
        let response = self.send(&request, 1).await?;
        cancel.check()?;
        Ok(response)
    }

    fn authorize(&self, request: HttpRequest, authenticated: bool) -> Result<HttpRequest> {
        let request = request.with_header("Accept", ACCEPT);
        if !authenticated {
            return Ok(request);
        }
        let token = self.credential.as_deref().ok_or_else(|| {
            VerifyError::Config(format!(
                "authenticated request needs a credential; set {CREDENTIAL_ENV}"
            ))
        })?;
        Ok(request.with_header("Authorization", format!("token {token}")))
    }

    /// Sends one request.
    ///
    /// A rate-limited response waits for the reset and retries once; a second
    /// rate-limited response fails with `RateLimitExhausted`. Timeouts and 5xx
    /// back off exponentially up to the configured attempts. Other non-2xx
    /// statuses fail immediately with `RequestRejected`.
    async fn send(&self, request: &HttpRequest, page: u32) -> Result<HttpResponse> {
        let mut retry = RetryState::new();
        let mut rate_limited = false;

        loop {
            self.gate.acquire().await;

            let failure = match self.transport.get(request).await {
                Ok(response) => {
                    self.gate.observe(&response);

                    let now = chrono::Utc::now().timestamp();
                    if let Some(wait) = rate_limit_wait(&response, now, self.rate_limit_fallback) {
                        if rate_limited {
                            return Err(VerifyError::RateLimitExhausted {
                                url: request.url.clone(),
                                page,
                            });
                        }
                        rate_limited = true;
                        warn!(
                            url = %request.url,
                            page,
                            status = response.status,
                            wait_s = wait.as_secs(),
                            "Rate limited, waiting for reset"
                        );
                        self.gate.defer_for(wait);
                        continue;
                    }

                    if response.status >= 500 {
                        format!("server error {}", response.status)
                    } else if response.is_success() {
                        return Ok(response);
                    } else {
                        return Err(VerifyError::RequestRejected {
                            status: response.status,
                            url: request.url.clone(),
                            body: response.body,
                        });
                    }
                }
                Err(e) if e.is_transient() => e.to_string(),
                Err(e) => return Err(e),
            };

            match retry.record_failure(&self.retry) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        url = %request.url,
                        page,
                        attempt = retry.attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    return Err(VerifyError::TransientNetwork {
                        attempts: retry.attempt,
                        message: failure,
                    });
                }
            }
        }
    }
}

/// Appends items up to `max_items`. Returns whether the cap was reached.
fn push_items(items: &mut Vec<ResultItem>, values: Vec<Value>, max_items: Option<usize>) -> Result<bool> {
    for value in values {
        if max_items.is_some_and(|max| items.len() >= max) {
            return Ok(true);
        }
        items.push(ResultItem::from_value(value)?);
    }
    Ok(max_items.is_some_and(|max| items.len() >= max))
}
