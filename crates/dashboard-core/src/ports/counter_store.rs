use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;

/// Counter store trait - the atomic key/counter service backing the limiter
/// (Redis, in-memory).
///
/// Implementations must linearize concurrent increments on one key.
/// Keys leave the store only through expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current count, `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Increment the key. If this increment created the key (the result is
    /// 1) and `ttl` is given, set its expiry in the same atomic unit. An
    /// existing key keeps its expiry. Returns the post-increment count.
    async fn incr_and_expire(&self, key: &str, ttl: Option<Duration>)
    -> Result<u64, StoreError>;

    /// Increment without touching the expiry.
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        self.incr_and_expire(key, None).await
    }

    /// Set the key's time-to-live. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remaining lifetime, `None` when the key is absent or never expires.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}
