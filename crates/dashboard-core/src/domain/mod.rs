//! Domain types - rate limiting vocabulary and the backtest model.

mod backtest;
mod rate_limit;

pub use backtest::{BacktestOutcome, BacktestParams, Strategy, Trade};
pub use rate_limit::{
    ActionName, CounterKey, DEFAULT_KEY_PREFIX, Decision, FailMode, Identity, LimitPolicy,
    MAX_PERIOD_SECS, PolicyTable,
};
