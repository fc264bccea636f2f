//! # Dashboard Infrastructure
//!
//! Concrete implementations of the ports defined in `dashboard-core`:
//! counter stores, the fixed-window rate limiter, clocks, and the
//! out-of-process backtest engine.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory counter store only
//! - `redis` - Redis counter store shared across server replicas

pub mod clock;
pub mod counter_store;
pub mod engine;
pub mod rate_limit;

// Re-exports - In-Memory
pub use clock::{ManualClock, SystemClock};
pub use counter_store::InMemoryCounterStore;
pub use engine::{SubprocessBacktestEngine, SubprocessEngineConfig};
pub use rate_limit::{FixedWindowRateLimiter, RateLimitConfig};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use counter_store::{RedisConfig, RedisCounterStore};
