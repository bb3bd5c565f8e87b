//! Process-wide rate-limit budget.
//!
//! Every outbound request goes through one shared [`RateLimitGate`]. When
//! any case learns that the provider's budget is spent, the gate's "next
//! permitted request time" moves forward and every case waits for it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::transport::HttpResponse;

/// Header carrying the requests left in the current window.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Header carrying the window reset time as epoch seconds.
pub const RESET_HEADER: &str = "x-ratelimit-reset";
/// Header carrying a relative wait in seconds.
pub const RETRY_AFTER_HEADER: &str = "retry-after";

#[derive(Debug, Default)]
struct GateState {
    next_permitted: Option<Instant>,
    remaining: Option<u64>,
}

/// Shared "next permitted request time".
#[derive(Debug)]
pub struct RateLimitGate {
    state: Mutex<GateState>,
    max_wait: Duration,
    granted: AtomicU64,
}

impl RateLimitGate {
    /// Creates an open gate. Waits longer than `max_wait` are clamped.
    #[must_use]
    pub fn new(max_wait: Duration) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            max_wait,
            granted: AtomicU64::new(0),
        }
    }

    /// Waits until a request is permitted and returns how long it waited.
    ///
    /// The deadline is re-read after every sleep, so a deferral made by
    /// another case while this one waits is honoured too.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let state = self.state.lock();
                let now = Instant::now();
                match state.next_permitted {
                    Some(at) if at > now => at - now,
                    _ => {
                        self.granted.fetch_add(1, Ordering::SeqCst);
                        return waited;
                    }
                }
            };
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate-limit window");
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Blocks all requests for `wait` from now, unless already blocked for longer.
    pub fn defer_for(&self, wait: Duration) {
        let wait = if wait > self.max_wait {
            warn!(
                requested_s = wait.as_secs(),
                max_s = self.max_wait.as_secs(),
                "Rate-limit wait clamped"
            );
            self.max_wait
        } else {
            wait
        };

        let until = Instant::now() + wait;
        let mut state = self.state.lock();
        state.next_permitted = Some(match state.next_permitted {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// Records the budget headers of a response. A spent budget defers the
    /// gate until the advertised reset.
    pub fn observe(&self, response: &HttpResponse) {
        let remaining = response
            .header(REMAINING_HEADER)
            .and_then(|v| v.trim().parse::<u64>().ok());
        if remaining.is_none() {
            return;
        }
        self.state.lock().remaining = remaining;

        if remaining == Some(0) {
            if let Some(wait) = reset_wait(response, chrono::Utc::now().timestamp()) {
                self.defer_for(wait);
            }
        }
    }

    /// Last observed remaining budget.
    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        self.state.lock().remaining
    }

    /// Number of requests let through.
    #[must_use]
    pub fn granted(&self) -> u64 {
        self.granted.load(Ordering::SeqCst)
    }
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new(Duration::from_secs(3_600))
    }
}

fn reset_wait(response: &HttpResponse, now_epoch: i64) -> Option<Duration> {
    let reset = response
        .header(RESET_HEADER)
        .and_then(|v| v.trim().parse::<i64>().ok())?;
    let seconds = u64::try_from(reset.saturating_sub(now_epoch)).unwrap_or(0);
    Some(Duration::from_secs(seconds))
}

/// Classifies a response as rate limited and returns how long to wait.
///
/// A 429, or a 403 whose budget headers show zero remaining (or that carries
/// `retry-after`), is a rate-limit response. A 403 without those headers is
/// an ordinary rejection. When no header states the wait, `fallback` is used.
#[must_use]
pub fn rate_limit_wait(response: &HttpResponse, now_epoch: i64, fallback: Duration) -> Option<Duration> {
    if response.status != 403 && response.status != 429 {
        return None;
    }

    if let Some(seconds) = response
        .header(RETRY_AFTER_HEADER)
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(seconds));
    }

    let spent = response
        .header(REMAINING_HEADER)
        .is_some_and(|v| v.trim() == "0");

    if spent || response.status == 429 {
        return Some(reset_wait(response, now_epoch).unwrap_or(fallback));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_classifies_rate_limit_responses() {
        let spent = HttpResponse::new(403, "API rate limit exceeded")
            .with_header(REMAINING_HEADER, "0")
            .with_header(RESET_HEADER, (NOW + 42).to_string());
        assert_eq!(rate_limit_wait(&spent, NOW, Duration::from_secs(1)), Some(Duration::from_secs(42)));

        let secondary = HttpResponse::new(403, "").with_header(RETRY_AFTER_HEADER, "7");
        assert_eq!(rate_limit_wait(&secondary, NOW, Duration::ZERO), Some(Duration::from_secs(7)));

        let too_many = HttpResponse::new(429, "");
        assert_eq!(rate_limit_wait(&too_many, NOW, Duration::from_secs(3)), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_plain_forbidden_is_not_rate_limit() {
        let forbidden = HttpResponse::new(403, "Resource not accessible")
            .with_header(REMAINING_HEADER, "55");
        assert_eq!(rate_limit_wait(&forbidden, NOW, Duration::from_secs(1)), None);
        assert_eq!(rate_limit_wait(&HttpResponse::new(422, ""), NOW, Duration::from_secs(1)), None);
    }

    #[test]
    fn test_reset_in_the_past_means_no_wait() {
        let stale = HttpResponse::new(403, "")
            .with_header(REMAINING_HEADER, "0")
            .with_header(RESET_HEADER, (NOW - 10).to_string());
        assert_eq!(rate_limit_wait(&stale, NOW, Duration::from_secs(5)), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_gate_does_not_wait() {
        let gate = RateLimitGate::default();
        assert_eq!(gate.acquire().await, Duration::ZERO);
        assert_eq!(gate.granted(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_gate_waits() {
        let gate = RateLimitGate::default();
        gate.defer_for(Duration::from_secs(30));

        let start = Instant::now();
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_defer_keeps_the_later_deadline() {
        let gate = RateLimitGate::default();
        gate.defer_for(Duration::from_secs(60));
        gate.defer_for(Duration::from_secs(5));

        let waited = gate.acquire().await;
        assert!(waited >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_clamped() {
        let gate = RateLimitGate::new(Duration::from_secs(10));
        gate.defer_for(Duration::from_secs(10_000));

        let waited = gate.acquire().await;
        assert!(waited <= Duration::from_secs(11));
    }

    #[test]
    fn test_observe_tracks_remaining() {
        let gate = RateLimitGate::default();
        gate.observe(&HttpResponse::new(200, "").with_header(REMAINING_HEADER, "9"));
        assert_eq!(gate.remaining(), Some(9));
    }
}
