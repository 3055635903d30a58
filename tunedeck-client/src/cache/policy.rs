//! Read and mutation policies, plus the shared retry loop.

use std::future::Future;
use std::time::Duration;

use tunedeck_core::ApiResult;

/// Exponential backoff: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            max: Duration::from_millis(30_000),
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// How a cached read treats freshness and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// Age after which an entry is served stale and refetched in the background.
    pub stale_time: Duration,
    /// Idle time after which an entry is evicted.
    pub ttl: Duration,
    /// Retries after the first failed attempt; transient errors only.
    pub retry: u32,
    pub backoff: Backoff,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(5 * 60),
            ttl: Duration::from_secs(10 * 60),
            retry: 3,
            backoff: Backoff::default(),
        }
    }
}

impl QueryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff = Backoff::new(base, max);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationPolicy {
    pub retry: u32,
    pub backoff: Backoff,
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self {
            retry: 1,
            backoff: Backoff::default(),
        }
    }
}

impl MutationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff = Backoff::new(base, max);
        self
    }

    /// Run a write, retrying transient failures.
    pub async fn run<T, F, Fut>(&self, op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        with_retry(self.retry, self.backoff, op).await
    }
}

/// Call `op` until it succeeds, fails permanently, or `retry` retries are spent.
pub(crate) async fn with_retry<T, F, Fut>(retry: u32, backoff: Backoff, mut op: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < retry => {
                let delay = backoff.delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
