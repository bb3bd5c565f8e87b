//! Harness configuration.
//!
//! Process-wide options shared by every case in a run: the credential used
//! for authenticated cases, pagination ceilings, the parallel case limit and
//! retry timing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{Result, VerifyError};
use crate::executor::{JitterStrategy, RetryConfig};

/// Environment variable holding the provider token.
pub const CREDENTIAL_ENV: &str = "GITHUB_TOKEN";

/// Largest page size the provider accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Configuration for a verification run.
#[derive(Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Token for authenticated cases. Absent means only anonymous cases can run.
    #[serde(default)]
    pub credential: Option<String>,
    /// Pagination ceiling per case.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Requested items per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Maximum number of cases running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Base delay for transient-failure backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound for a single backoff delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Attempts per request for transient failures, including the first.
    #[serde(default = "default_transient_attempts")]
    pub max_transient_attempts: usize,
    /// Longest rate-limit wait the harness will honour.
    #[serde(default = "default_max_rate_limit_wait")]
    pub max_rate_limit_wait_seconds: u64,
    /// Search API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Raw file host used to resolve READMEs.
    #[serde(default = "default_raw_content_base_url")]
    pub raw_content_base_url: String,
    /// README file name relative to the repository root.
    #[serde(default = "default_readme_path")]
    pub readme_path: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Violating items listed per failed case report.
    #[serde(default = "default_max_reported_violations")]
    pub max_reported_violations: usize,
    /// Treat inconclusive cases as failures for the exit code.
    #[serde(default)]
    pub strict: bool,
}

fn default_max_pages() -> u32 {
    1
}

fn default_page_size() -> u32 {
    30
}

fn default_concurrency() -> usize {
    2
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_transient_attempts() -> usize {
    3
}

fn default_max_rate_limit_wait() -> u64 {
    3_600
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_content_base_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_readme_path() -> String {
    "README.md".to_string()
}

fn default_timeout() -> f64 {
    30.0
}

fn default_user_agent() -> String {
    "searchverify/0.1".to_string()
}

fn default_max_reported_violations() -> usize {
    10
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            credential: None,
            max_pages: default_max_pages(),
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            backoff_base_ms: default_backoff_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_transient_attempts: default_transient_attempts(),
            max_rate_limit_wait_seconds: default_max_rate_limit_wait(),
            api_base_url: default_api_base_url(),
            raw_content_base_url: default_raw_content_base_url(),
            readme_path: default_readme_path(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            max_reported_violations: default_max_reported_violations(),
            strict: false,
        }
    }
}

// The credential never appears in debug output.
impl std::fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("max_pages", &self.max_pages)
            .field("page_size", &self.page_size)
            .field("concurrency", &self.concurrency)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("api_base_url", &self.api_base_url)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

impl HarnessConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from defaults overridden by the environment.
    ///
    /// Reads `GITHUB_TOKEN` plus the `SEARCHVERIFY_MAX_PAGES`,
    /// `SEARCHVERIFY_CONCURRENCY`, `SEARCHVERIFY_BACKOFF_BASE_MS` and
    /// `SEARCHVERIFY_STRICT` overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.credential = std::env::var(CREDENTIAL_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty());

        if let Some(pages) = env_parse::<u32>("SEARCHVERIFY_MAX_PAGES")? {
            config.max_pages = pages;
        }
        if let Some(concurrency) = env_parse::<usize>("SEARCHVERIFY_CONCURRENCY")? {
            config.concurrency = concurrency;
        }
        if let Some(base) = env_parse::<u64>("SEARCHVERIFY_BACKOFF_BASE_MS")? {
            config.backoff_base_ms = base;
        }
        if let Some(strict) = env_parse::<bool>("SEARCHVERIFY_STRICT")? {
            config.strict = strict;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the limits are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(VerifyError::Config("max_pages must be at least 1".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(VerifyError::Config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.concurrency == 0 {
            return Err(VerifyError::Config("concurrency must be at least 1".into()));
        }
        if self.max_transient_attempts == 0 {
            return Err(VerifyError::Config(
                "max_transient_attempts must be at least 1".into(),
            ));
        }
        if self.timeout_seconds <= 0.0 {
            return Err(VerifyError::Config("timeout_seconds must be positive".into()));
        }
        Ok(())
    }

    /// Sets the credential.
    #[must_use]
    pub fn with_credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(token.into());
        self
    }

    /// Sets the pagination ceiling.
    #[must_use]
    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.max_pages = pages;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the parallel case limit.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the backoff base delay.
    #[must_use]
    pub fn with_backoff_base_ms(mut self, base: u64) -> Self {
        self.backoff_base_ms = base;
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Sets the raw content base URL.
    #[must_use]
    pub fn with_raw_content_base_url(mut self, url: impl Into<String>) -> Self {
        self.raw_content_base_url = url.into();
        self
    }

    /// Enables strict exit codes.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    /// Longest rate-limit wait as Duration.
    #[must_use]
    pub fn max_rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.max_rate_limit_wait_seconds)
    }

    /// Retry policy for transient failures.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.max_transient_attempts)
            .with_base_delay_ms(self.backoff_base_ms)
            .with_max_delay_ms(self.max_backoff_ms)
            .with_jitter(JitterStrategy::None)
    }

    /// Whether authenticated cases can run.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| VerifyError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}
