//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};

/// Request to run a backtest. Missing fields take the form defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestRequest {
    pub strategy: String,
    pub ticker: String,
    pub window: u32,
    pub capital: i64,
    pub long_qty: i64,
    pub short_qty: i64,
}

impl Default for BacktestRequest {
    fn default() -> Self {
        Self {
            strategy: "ma_crossover".to_string(),
            ticker: "AAPL".to_string(),
            window: 90,
            capital: 1_000_000,
            long_qty: 100,
            short_qty: -100,
        }
    }
}

/// One row of the trades table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRow {
    pub timestamp: String,
    pub ticker: String,
    pub quantity: i64,
    pub price: f64,
    pub value: f64,
}

/// Result of a finished backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResponse {
    pub n_trades: u64,
    pub trades: Vec<TradeRow>,
}

/// Entry of the strategy picker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyOption {
    pub label: String,
    pub value: String,
}
