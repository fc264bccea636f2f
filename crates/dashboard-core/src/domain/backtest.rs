//! Backtest request and result model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Trading strategies the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    MaCrossover,
}

impl Strategy {
    pub const ALL: &'static [Strategy] = &[Strategy::MaCrossover];

    /// Identifier passed to the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::MaCrossover => "ma_crossover",
        }
    }

    /// Human-readable name for pickers.
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::MaCrossover => "MA Crossover",
        }
    }
}

impl FromStr for Strategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.as_str() == s.trim())
            .ok_or_else(|| DomainError::Validation(format!("unknown strategy '{}'", s.trim())))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated parameters for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestParams {
    pub strategy: Strategy,
    pub ticker: String,
    pub window: u32,
    pub capital: i64,
    pub long_qty: i64,
    pub short_qty: i64,
}

impl BacktestParams {
    /// Validate raw form values. The ticker is trimmed and upper-cased.
    pub fn new(
        strategy: Strategy,
        ticker: &str,
        window: u32,
        capital: i64,
        long_qty: i64,
        short_qty: i64,
    ) -> Result<Self, DomainError> {
        let ticker = ticker.trim().to_ascii_uppercase();
        if ticker.is_empty() {
            return Err(DomainError::Validation("ticker must not be empty".to_string()));
        }
        if !ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(DomainError::Validation(format!(
                "ticker '{}' contains invalid characters",
                ticker
            )));
        }
        if window == 0 {
            return Err(DomainError::Validation("window must be at least 1".to_string()));
        }
        if capital <= 0 {
            return Err(DomainError::Validation("capital must be positive".to_string()));
        }
        if long_qty < 0 {
            return Err(DomainError::Validation(
                "long quantity must not be negative".to_string(),
            ));
        }
        if short_qty > 0 {
            return Err(DomainError::Validation(
                "short quantity must not be positive".to_string(),
            ));
        }

        Ok(Self {
            strategy,
            ticker,
            window,
            capital,
            long_qty,
            short_qty,
        })
    }
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            strategy: Strategy::MaCrossover,
            ticker: "AAPL".to_string(),
            window: 90,
            capital: 1_000_000,
            long_qty: 100,
            short_qty: -100,
        }
    }
}

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: String,
    pub ticker: String,
    pub quantity: i64,
    pub price: f64,
}

impl Trade {
    /// Signed notional of the fill.
    pub fn value(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// Structured result returned by the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub n_trades: u64,
    pub trades: Vec<Trade>,
}
