//! Keyed query cache with stale-while-revalidate reads.
//!
//! Entries are indexed by the normalized [`QueryKey`]. Each fetch runs in its
//! own task and is shared between every waiter on that key, so dropping one
//! waiter never cancels the request.

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tunedeck_core::{ApiError, ApiResult, QueryKey};

use super::policy::{with_retry, QueryPolicy};
use super::read::CacheRead;
use crate::envelope::decode;

type SharedFetch = Shared<BoxFuture<'static, ApiResult<Value>>>;

/// Counters for cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub fetches: u64,
    /// Reads that joined a fetch already in flight.
    pub coalesced: u64,
    pub evictions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Fresh,
    /// Past its stale time; served while a background refetch runs.
    Stale,
    /// Marked by `invalidate`; the next read waits for a refetch.
    Invalidated,
    /// No value yet.
    Pending,
}

struct Stored {
    value: Value,
    fetched_at: Instant,
    fetched_wall: DateTime<Utc>,
}

impl Stored {
    fn new(value: Value, now: Instant) -> Self {
        Self {
            value,
            fetched_at: now,
            fetched_wall: Utc::now(),
        }
    }
}

struct InFlight {
    id: u64,
    future: SharedFetch,
}

struct Entry {
    key: QueryKey,
    stored: Option<Stored>,
    invalidated: bool,
    stale_time: Duration,
    ttl: Duration,
    last_access: Instant,
    in_flight: Option<InFlight>,
}

impl Entry {
    fn new(key: QueryKey, policy: &QueryPolicy, now: Instant) -> Self {
        Self {
            key,
            stored: None,
            invalidated: false,
            stale_time: policy.stale_time,
            ttl: policy.ttl,
            last_access: now,
            in_flight: None,
        }
    }

    fn status(&self, now: Instant) -> EntryStatus {
        match &self.stored {
            None => EntryStatus::Pending,
            Some(_) if self.invalidated => EntryStatus::Invalidated,
            Some(stored) if now.duration_since(stored.fetched_at) >= self.stale_time => {
                EntryStatus::Stale
            }
            Some(_) => EntryStatus::Fresh,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.in_flight.is_none() && now.duration_since(self.last_access) > self.ttl
    }
}

struct CacheState {
    entries: HashMap<String, Entry>,
    /// Bumped by `clear`; fetches from an older generation never write back.
    generation: u64,
    next_fetch_id: u64,
    stats: CacheStats,
    defaults: QueryPolicy,
}

impl CacheState {
    fn evict_expired(&mut self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - self.entries.len();
        if evicted > 0 {
            self.stats.evictions += evicted as u64;
            tracing::debug!(evicted, "Evicted expired cache entries");
        }
    }

    fn next_fetch_id(&mut self) -> u64 {
        self.next_fetch_id += 1;
        self.next_fetch_id
    }
}

enum Plan {
    Ready(CacheRead<Value>),
    Wait(SharedFetch),
}

#[derive(Clone)]
pub struct QueryCache {
    state: Arc<Mutex<CacheState>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_defaults(QueryPolicy::default())
    }

    /// `defaults` supplies stale time and ttl for entries seeded by `write`.
    pub fn with_defaults(defaults: QueryPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                generation: 0,
                next_fetch_id: 0,
                stats: CacheStats::default(),
                defaults,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn defaults(&self) -> QueryPolicy {
        self.lock().defaults
    }

    /// Read `key`, fetching through `fetcher` when needed, and decode as `T`.
    pub async fn read<T, F, Fut>(
        &self,
        key: &QueryKey,
        policy: &QueryPolicy,
        fetcher: F,
    ) -> ApiResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let read = self
            .read_value(key, policy, move || {
                let fetch = fetcher();
                async move {
                    let value = fetch.await?;
                    serde_json::to_value(value).map_err(|err| {
                        ApiError::network(format!("unserializable response: {}", err))
                    })
                }
            })
            .await?;
        read.try_map(decode)
    }

    /// Read `key` as raw JSON.
    ///
    /// Fresh entries return without calling `fetcher`. Stale entries return
    /// at once and start a background refetch. Missing or invalidated entries
    /// wait for a fetch, joining one already in flight.
    pub async fn read_value<F, Fut>(
        &self,
        key: &QueryKey,
        policy: &QueryPolicy,
        fetcher: F,
    ) -> ApiResult<CacheRead<Value>>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<Value>> + Send + 'static,
    {
        match self.plan(key, policy, fetcher) {
            Plan::Ready(read) => Ok(read),
            Plan::Wait(fetch) => fetch.await.map(CacheRead::from_fetch),
        }
    }

    fn plan<F, Fut>(&self, key: &QueryKey, policy: &QueryPolicy, fetcher: F) -> Plan
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<Value>> + Send + 'static,
    {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        state.evict_expired(now);

        let id = key.normalized();
        let generation = state.generation;
        let fetch_id = state.next_fetch_id();
        let entry = state
            .entries
            .entry(id.clone())
            .or_insert_with(|| Entry::new(key.clone(), policy, now));
        entry.last_access = now;
        entry.stale_time = policy.stale_time;
        entry.ttl = policy.ttl;

        match entry.status(now) {
            EntryStatus::Fresh => {
                state.stats.hits += 1;
                Plan::Ready(served(entry, false))
            }
            EntryStatus::Stale => {
                state.stats.stale_hits += 1;
                if entry.in_flight.is_none() {
                    tracing::debug!(key = %key, "Serving stale entry, revalidating");
                    state.stats.fetches += 1;
                    let future = self.spawn_fetch(id, fetch_id, generation, *policy, fetcher);
                    entry.in_flight = Some(InFlight { id: fetch_id, future });
                }
                Plan::Ready(served(entry, true))
            }
            EntryStatus::Invalidated | EntryStatus::Pending => {
                if let Some(in_flight) = &entry.in_flight {
                    state.stats.coalesced += 1;
                    return Plan::Wait(in_flight.future.clone());
                }
                state.stats.misses += 1;
                state.stats.fetches += 1;
                tracing::debug!(key = %key, "Cache miss, fetching");
                let future = self.spawn_fetch(id, fetch_id, generation, *policy, fetcher);
                entry.in_flight = Some(InFlight {
                    id: fetch_id,
                    future: future.clone(),
                });
                Plan::Wait(future)
            }
        }
    }

    fn spawn_fetch<F, Fut>(
        &self,
        id: String,
        fetch_id: u64,
        generation: u64,
        policy: QueryPolicy,
        fetcher: F,
    ) -> SharedFetch
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<Value>> + Send + 'static,
    {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = with_retry(policy.retry, policy.backoff, move || fetcher()).await;
            cache.complete(&id, fetch_id, generation, &outcome);
            outcome
        });
        async move {
            handle.await.unwrap_or_else(|err| {
                Err(ApiError::network(format!("fetch task failed: {}", err)))
            })
        }
        .boxed()
        .shared()
    }

    fn complete(&self, id: &str, fetch_id: u64, generation: u64, outcome: &ApiResult<Value>) {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.generation != generation {
            tracing::debug!(key = id, "Discarding fetch started before cache clear");
            return;
        }
        let Some(entry) = state.entries.get_mut(id) else {
            return;
        };
        if entry.in_flight.as_ref().map(|f| f.id) != Some(fetch_id) {
            tracing::debug!(key = id, "Discarding superseded fetch");
            return;
        }
        entry.in_flight = None;

        match outcome {
            Ok(value) => {
                entry.stored = Some(Stored::new(value.clone(), now));
                entry.invalidated = false;
            }
            Err(err) => {
                tracing::warn!(key = id, error = %err, "Query fetch failed");
                if entry.stored.is_none() {
                    state.entries.remove(id);
                }
            }
        }
    }

    /// Replace or seed the entry for `key`.
    pub fn write<T: Serialize>(&self, key: &QueryKey, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.write_value(key, value);
        Ok(())
    }

    pub fn write_value(&self, key: &QueryKey, value: Value) {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        state.evict_expired(now);
        let defaults = state.defaults;
        let entry = state
            .entries
            .entry(key.normalized())
            .or_insert_with(|| Entry::new(key.clone(), &defaults, now));
        entry.stored = Some(Stored::new(value, now));
        entry.invalidated = false;
        // A pending fetch must not overwrite the seeded value.
        entry.in_flight = None;
        entry.last_access = now;
    }

    /// Mark every entry under `prefix` so its next read refetches.
    ///
    /// Returns the number of entries touched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut guard = self.lock();
        let mut count = 0;
        for entry in guard
            .entries
            .values_mut()
            .filter(|entry| entry.key.starts_with(prefix))
        {
            entry.invalidated = true;
            entry.in_flight = None;
            count += 1;
        }
        tracing::debug!(prefix = %prefix, count, "Invalidated cache entries");
        count
    }

    pub fn clear(&self) {
        let mut guard = self.lock();
        guard.entries.clear();
        guard.generation += 1;
        tracing::info!(generation = guard.generation, "Cleared query cache");
    }

    /// Current value for `key`, without fetching or touching its access time.
    pub fn peek(&self, key: &QueryKey) -> Option<Value> {
        self.lock()
            .entries
            .get(&key.normalized())
            .and_then(|entry| entry.stored.as_ref())
            .map(|stored| stored.value.clone())
    }

    pub fn status(&self, key: &QueryKey) -> Option<EntryStatus> {
        let now = Instant::now();
        self.lock()
            .entries
            .get(&key.normalized())
            .map(|entry| entry.status(now))
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn served(entry: &Entry, was_stale: bool) -> CacheRead<Value> {
    match &entry.stored {
        Some(stored) => CacheRead::from_cache(stored.value.clone(), stored.fetched_wall, was_stale),
        None => CacheRead::from_cache(Value::Null, Utc::now(), was_stale),
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("QueryCache")
            .field("entries", &state.entries.len())
            .field("generation", &state.generation)
            .field("stats", &state.stats)
            .finish()
    }
}
