//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod backtest_engine;
mod clock;
mod counter_store;
mod rate_limit;

pub use backtest_engine::{BacktestEngine, ComputationError};
pub use clock::Clock;
pub use counter_store::CounterStore;
pub use rate_limit::{RateLimitError, RateLimiter};
