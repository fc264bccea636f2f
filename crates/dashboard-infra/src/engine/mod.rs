//! Backtest engine adapters.

mod subprocess;

pub use subprocess::{SubprocessBacktestEngine, SubprocessEngineConfig};
