//! Backtest engine port - the expensive computation behind the limiter.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{BacktestOutcome, BacktestParams};

/// Runs one backtest and returns its structured result.
#[async_trait]
pub trait BacktestEngine: Send + Sync {
    async fn run(&self, params: &BacktestParams) -> Result<BacktestOutcome, ComputationError>;
}

/// Engine invocation failures. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum ComputationError {
    #[error("Failed to start backtest engine: {0}")]
    Spawn(String),

    #[error("Backtest engine exited with {}: {stderr}", exit_status(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("Backtest engine did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Backtest engine returned unreadable output: {0}")]
    InvalidOutput(String),
}

impl ComputationError {
    /// Diagnostic text suitable for showing to the user.
    pub fn diagnostic(&self) -> String {
        match self {
            ComputationError::Failed { stderr, .. } if !stderr.trim().is_empty() => {
                stderr.trim().to_string()
            }
            other => other.to_string(),
        }
    }
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}
