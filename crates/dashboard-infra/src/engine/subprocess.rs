//! Backtest engine running as a child process.
//!
//! The engine binary receives the parameters as flags and prints one JSON
//! document on stdout:
//!
//! ```json
//! {"n_trades": 2, "trades": [{"timestamp": "...", "ticker": "AAPL", "quantity": 100, "price": 187.2}]}
//! ```
//!
//! Trades nested under `portfolio.trades` are accepted as well.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use dashboard_core::domain::{BacktestOutcome, BacktestParams, Trade};
use dashboard_core::ports::{BacktestEngine, ComputationError};

/// Engine invocation configuration.
#[derive(Debug, Clone)]
pub struct SubprocessEngineConfig {
    /// Engine executable.
    pub program: PathBuf,
    /// Arguments placed before the parameter flags.
    pub args: Vec<String>,
    /// Wall-clock limit for one run.
    pub timeout: Duration,
}

impl Default for SubprocessEngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("trading-engine"),
            args: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl SubprocessEngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            program: std::env::var("ENGINE_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("trading-engine")),
            args: std::env::var("ENGINE_ARGS")
                .map(|v| v.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            timeout: Duration::from_secs(
                std::env::var("ENGINE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EngineOutput {
    n_trades: Option<u64>,
    #[serde(default)]
    trades: Option<Vec<Trade>>,
    #[serde(default)]
    portfolio: Option<PortfolioOutput>,
}

#[derive(Debug, Deserialize)]
struct PortfolioOutput {
    #[serde(default)]
    trades: Vec<Trade>,
}

impl EngineOutput {
    fn into_outcome(self) -> BacktestOutcome {
        let trades = self
            .trades
            .or_else(|| self.portfolio.map(|p| p.trades))
            .unwrap_or_default();
        BacktestOutcome {
            n_trades: self.n_trades.unwrap_or(trades.len() as u64),
            trades,
        }
    }
}

/// Runs the engine binary once per backtest. The child is killed if the
/// caller stops waiting.
pub struct SubprocessBacktestEngine {
    config: SubprocessEngineConfig,
}

impl SubprocessBacktestEngine {
    pub fn new(config: SubprocessEngineConfig) -> Self {
        Self { config }
    }

    fn command(&self, params: &BacktestParams) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg("--strategy")
            .arg(params.strategy.as_str())
            .arg("--ticker")
            .arg(&params.ticker)
            .arg("--window")
            .arg(params.window.to_string())
            .arg("--capital")
            .arg(params.capital.to_string())
            .arg("--long-qty")
            .arg(params.long_qty.to_string())
            .arg("--short-qty")
            .arg(params.short_qty.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl BacktestEngine for SubprocessBacktestEngine {
    async fn run(&self, params: &BacktestParams) -> Result<BacktestOutcome, ComputationError> {
        tracing::info!(
            program = %self.config.program.display(),
            strategy = %params.strategy,
            ticker = %params.ticker,
            "Starting backtest engine"
        );

        let child = self
            .command(params)
            .spawn()
            .map_err(|e| ComputationError::Spawn(e.to_string()))?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| ComputationError::Timeout(self.config.timeout))?
            .map_err(|e| ComputationError::Spawn(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(code = ?output.status.code(), stderr = %stderr.trim(), "Backtest engine failed");
            return Err(ComputationError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        let parsed: EngineOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ComputationError::InvalidOutput(e.to_string()))?;
        let outcome = parsed.into_outcome();

        tracing::info!(n_trades = outcome.n_trades, "Backtest engine finished");
        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// `sh -c <script> engine` - the parameter flags land in `$1..` and are
    /// ignored by the script.
    fn shell_engine(script: &str, timeout: Duration) -> SubprocessBacktestEngine {
        SubprocessBacktestEngine::new(SubprocessEngineConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string(), "engine".to_string()],
            timeout,
        })
    }

    #[tokio::test]
    async fn test_parses_engine_output() {
        let engine = shell_engine(
            r#"echo '{"n_trades": 1, "trades": [{"timestamp": "2024-01-02", "ticker": "AAPL", "quantity": 100, "price": 185.5}]}'"#,
            Duration::from_secs(5),
        );

        let outcome = engine.run(&BacktestParams::default()).await.unwrap();
        assert_eq!(outcome.n_trades, 1);
        assert_eq!(outcome.trades[0].ticker, "AAPL");
        assert_eq!(outcome.trades[0].quantity, 100);
    }

    #[tokio::test]
    async fn test_accepts_portfolio_trades() {
        let engine = shell_engine(
            r#"echo '{"portfolio": {"trades": [{"timestamp": "t", "ticker": "MSFT", "quantity": -5, "price": 10.0}]}}'"#,
            Duration::from_secs(5),
        );

        let outcome = engine.run(&BacktestParams::default()).await.unwrap();
        assert_eq!(outcome.n_trades, 1);
        assert_eq!(outcome.trades[0].ticker, "MSFT");
    }

    #[tokio::test]
    async fn test_receives_parameter_flags() {
        let engine = shell_engine(
            r#"[ "$2" = "ma_crossover" ] && [ "$4" = "AAPL" ] && echo '{"n_trades": 0, "trades": []}' || { echo "bad args: $*" >&2; exit 2; }"#,
            Duration::from_secs(5),
        );

        let outcome = engine.run(&BacktestParams::default()).await.unwrap();
        assert_eq!(outcome, BacktestOutcome::default());
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let engine = shell_engine("echo 'Data loading error: no data' >&2; exit 3", Duration::from_secs(5));

        match engine.run(&BacktestParams::default()).await {
            Err(err @ ComputationError::Failed { code: Some(3), .. }) => {
                assert_eq!(err.diagnostic(), "Data loading error: no data");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_output() {
        let engine = shell_engine("echo not-json", Duration::from_secs(5));
        assert!(matches!(
            engine.run(&BacktestParams::default()).await,
            Err(ComputationError::InvalidOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let engine = shell_engine("sleep 5", Duration::from_millis(100));
        assert!(matches!(
            engine.run(&BacktestParams::default()).await,
            Err(ComputationError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let engine = SubprocessBacktestEngine::new(SubprocessEngineConfig {
            program: PathBuf::from("/nonexistent/trading-engine"),
            ..SubprocessEngineConfig::default()
        });
        assert!(matches!(
            engine.run(&BacktestParams::default()).await,
            Err(ComputationError::Spawn(_))
        ));
    }
}
