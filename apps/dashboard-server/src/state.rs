//! Application state - shared across all handlers.

use std::sync::Arc;

use dashboard_core::StoreError;
use dashboard_core::domain::FailMode;
use dashboard_core::ports::{BacktestEngine, CounterStore, RateLimiter};
use dashboard_infra::{FixedWindowRateLimiter, SubprocessBacktestEngine};

#[cfg(not(feature = "redis"))]
use dashboard_infra::InMemoryCounterStore;
#[cfg(feature = "redis")]
use dashboard_infra::{InMemoryCounterStore, RedisCounterStore};

use crate::config::{AppConfig, IdentityConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<dyn RateLimiter>,
    pub engine: Arc<dyn BacktestEngine>,
    pub identity: IdentityConfig,
    pub fail_mode: FailMode,
}

impl AppState {
    /// Build the application state with the configured store and engine.
    pub async fn new(config: &AppConfig) -> Result<Self, StoreError> {
        let store = Self::counter_store(config).await?;

        let limiter = Arc::new(FixedWindowRateLimiter::new(store, config.rate_limit.clone()));
        let engine = Arc::new(SubprocessBacktestEngine::new(config.engine.clone()));

        tracing::info!(
            fail_mode = %config.rate_limit.fail_mode,
            max_requests = config.rate_limit.policies.default_policy().max_requests(),
            period_secs = config.rate_limit.policies.default_policy().period().as_secs(),
            "Application state initialized"
        );

        Ok(Self::from_parts(
            limiter,
            engine,
            config.identity.clone(),
            config.rate_limit.fail_mode,
        ))
    }

    /// Assemble state from already-built collaborators.
    pub fn from_parts(
        limiter: Arc<dyn RateLimiter>,
        engine: Arc<dyn BacktestEngine>,
        identity: IdentityConfig,
        fail_mode: FailMode,
    ) -> Self {
        Self {
            limiter,
            engine,
            identity,
            fail_mode,
        }
    }

    #[cfg(feature = "redis")]
    async fn counter_store(config: &AppConfig) -> Result<Arc<dyn CounterStore>, StoreError> {
        match RedisCounterStore::new(&config.redis).await {
            Ok(store) => Ok(Arc::new(store)),
            Err(e) if config.redis.fallback_to_memory => {
                tracing::error!(
                    "Failed to connect to Redis: {}. Using in-memory counters; limits are per-process.",
                    e
                );
                Ok(Arc::new(InMemoryCounterStore::new()))
            }
            Err(e) => Err(e),
        }
    }

    #[cfg(not(feature = "redis"))]
    async fn counter_store(_config: &AppConfig) -> Result<Arc<dyn CounterStore>, StoreError> {
        tracing::info!("Running without redis feature - using in-memory counter store");
        Ok(Arc::new(InMemoryCounterStore::new()))
    }
}
