//! In-memory counter store - the test double, and an opt-in fallback when
//! Redis is unavailable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use dashboard_core::StoreError;
use dashboard_core::ports::{Clock, CounterStore};

use crate::clock::SystemClock;

/// Minimum time between sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CounterEntry {
    count: u64,
    expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now < exp).unwrap_or(true)
    }
}

struct Counters {
    entries: HashMap<String, CounterEntry>,
    last_sweep: Instant,
}

impl Counters {
    /// Drop expired entries, at most once per [`SWEEP_INTERVAL`].
    fn sweep(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.last_sweep = now;

        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Swept expired counters");
        }
    }
}

/// In-memory counter store using a HashMap behind an async RwLock.
///
/// All mutations take the write lock, so increments on one key are
/// linearized. Counts are per-process: replicas do not see each other.
/// Expired entries read as absent and are purged by writes.
pub struct InMemoryCounterStore {
    counters: RwLock<Counters>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            counters: RwLock::new(Counters {
                entries: HashMap::new(),
                last_sweep: now,
            }),
            clock,
        }
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn deadline(now: Instant, ttl: Duration) -> Result<Instant, StoreError> {
    now.checked_add(ttl)
        .ok_or_else(|| StoreError::Operation(format!("ttl {:?} is out of range", ttl)))
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = self.clock.now();
        let counters = self.counters.read().await;
        Ok(counters
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.count))
    }

    async fn incr_and_expire(
        &self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<u64, StoreError> {
        let now = self.clock.now();
        let expires_at = ttl.map(|ttl| deadline(now, ttl)).transpose()?;

        let mut counters = self.counters.write().await;
        counters.sweep(now);

        // An expired entry is gone: the increment starts a fresh counter.
        if counters
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_live(now))
        {
            counters.entries.remove(key);
        }

        let entry = counters
            .entries
            .entry(key.to_string())
            .or_insert(CounterEntry {
                count: 0,
                expires_at: None,
            });
        entry.count += 1;
        if entry.count == 1 {
            entry.expires_at = expires_at;
        }

        Ok(entry.count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let expires_at = deadline(now, ttl)?;
        let mut counters = self.counters.write().await;

        match counters.entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(expires_at);
                Ok(true)
            }
            Some(_) => {
                counters.entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = self.clock.now();
        let counters = self.counters.read().await;
        Ok(counters
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|exp| exp - now))
    }
}
