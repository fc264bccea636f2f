//! Redis counter store - the shared store for every server replica.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};

use dashboard_core::StoreError;
use dashboard_core::ports::CounterStore;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether to fall back to the in-memory store if Redis is unreachable
    /// at startup. Limits then stop being shared across replicas.
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: false,
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            fallback_to_memory: std::env::var("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Redis-backed counter store.
///
/// Uses a connection manager for automatic reconnection. The
/// increment-with-expiry pair runs as one Lua script.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    /// INCR, then EXPIRE only if the INCR created the key.
    incr_script: Script,
}

impl RedisCounterStore {
    pub async fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str()).map_err(map_redis_error)?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(config.connect_timeout))?
            .map_err(map_redis_error)?;

        // ARGV[1] is the window in seconds; 0 leaves the key without expiry.
        let incr_script = Script::new(
            r#"
            local current = redis.call('INCR', KEYS[1])
            local ttl = tonumber(ARGV[1])
            if current == 1 and ttl > 0 then
                redis.call('EXPIRE', KEYS[1], ttl)
            end
            return current
            "#,
        );

        tracing::info!(url = %config.url, "Connected to Redis counter store");

        Ok(Self { conn, incr_script })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, StoreError> {
        Self::new(&RedisConfig::from_env()).await
    }
}

/// Redis takes expiries as signed seconds; sub-second remainders round up.
fn expiry_secs(ttl: Duration) -> Result<i64, StoreError> {
    let secs = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
    i64::try_from(secs.max(1))
        .map_err(|_| StoreError::Operation(format!("ttl {:?} is out of range", ttl)))
}

fn map_redis_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
        StoreError::Connection(e.to_string())
    } else if e.is_timeout() {
        StoreError::Connection(format!("timed out: {}", e))
    } else {
        StoreError::Operation(e.to_string())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<u64>>(key)
            .await
            .map_err(map_redis_error)
    }

    async fn incr_and_expire(
        &self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<u64, StoreError> {
        let ttl_secs = ttl.map(expiry_secs).transpose()?.unwrap_or(0);
        let mut conn = self.conn.clone();

        self.incr_script
            .key(key)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let secs = expiry_secs(ttl)?;
        let mut conn = self.conn.clone();
        conn.expire::<_, bool>(key, secs)
            .await
            .map_err(map_redis_error)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        let secs: i64 = conn.ttl(key).await.map_err(map_redis_error)?;

        // -2: no such key, -1: no expiry.
        Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
    }
}
