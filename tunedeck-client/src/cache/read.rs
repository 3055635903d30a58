//! Cache read results carrying freshness metadata.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Result of a cache read.
///
/// Callers always learn whether the value came from the cache and whether it
/// was already stale when served.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    fetched_at: DateTime<Utc>,
    was_cache_hit: bool,
    was_stale: bool,
}

impl<T> CacheRead<T> {
    /// A value served from an existing entry.
    pub fn from_cache(value: T, fetched_at: DateTime<Utc>, was_stale: bool) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: true,
            was_stale,
        }
    }

    /// A value that had to be fetched before returning.
    pub fn from_fetch(value: T) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
            was_cache_hit: false,
            was_stale: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    /// True when the value was served while a background refetch was pending.
    pub fn was_stale(&self) -> bool {
        self.was_stale
    }

    /// Time since the value was fetched.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            fetched_at: self.fetched_at,
            was_cache_hit: self.was_cache_hit,
            was_stale: self.was_stale,
        }
    }

    pub fn try_map<U, E, F>(self, f: F) -> Result<CacheRead<U>, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        Ok(CacheRead {
            value: f(self.value)?,
            fetched_at: self.fetched_at,
            was_cache_hit: self.was_cache_hit,
            was_stale: self.was_stale,
        })
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
