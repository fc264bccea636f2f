//! Backtest handlers - the rate limited run endpoint and the strategy list.

use actix_web::{HttpResponse, web};

use dashboard_core::domain::{BacktestOutcome, BacktestParams, Decision, Strategy};
use dashboard_shared::ApiResponse;
use dashboard_shared::dto::{BacktestRequest, BacktestResponse, StrategyOption, TradeRow};

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::identity::ClientIdentity;
use crate::state::AppState;

/// Quota name for backtest runs.
pub const BACKTEST_ACTION: &str = "backtest";

const NO_TRADES_MESSAGE: &str = "No trades were executed in this backtest.";

/// POST /api/backtests
///
/// Validates the form, asks the limiter for admission, then runs the engine.
/// Admission is consumed when granted, even if the engine later fails.
pub async fn run_backtest(
    state: web::Data<AppState>,
    identity: ClientIdentity,
    body: web::Json<BacktestRequest>,
) -> AppResult<HttpResponse> {
    let params = parse_params(body.into_inner())?;

    let decision = state
        .limiter
        .check_and_record(identity.as_str(), BACKTEST_ACTION)
        .await?;

    if decision == Decision::Denied {
        let retry_after = match state.limiter.retry_after(identity.as_str(), BACKTEST_ACTION).await {
            Ok(wait) => wait,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read rate limit window");
                None
            }
        };

        tracing::warn!(identity = %identity, "Rate limit exceeded for backtests");
        return Err(AppError::TooManyRequests { retry_after });
    }

    tracing::info!(
        identity = %identity,
        strategy = %params.strategy,
        ticker = %params.ticker,
        "Running backtest"
    );

    let outcome = state.engine.run(&params).await?;
    let response = to_response(outcome);

    if response.trades.is_empty() {
        Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(response, NO_TRADES_MESSAGE)))
    } else {
        Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
    }
}

/// GET /api/strategies
pub async fn list_strategies() -> HttpResponse {
    let options: Vec<StrategyOption> = Strategy::ALL
        .iter()
        .map(|s| StrategyOption {
            label: s.label().to_string(),
            value: s.as_str().to_string(),
        })
        .collect();

    HttpResponse::Ok().json(ApiResponse::ok(options))
}

fn parse_params(req: BacktestRequest) -> Result<BacktestParams, AppError> {
    let strategy: Strategy = req.strategy.parse()?;
    Ok(BacktestParams::new(
        strategy,
        &req.ticker,
        req.window,
        req.capital,
        req.long_qty,
        req.short_qty,
    )?)
}

fn to_response(outcome: BacktestOutcome) -> BacktestResponse {
    BacktestResponse {
        n_trades: outcome.n_trades,
        trades: outcome
            .trades
            .into_iter()
            .map(|trade| TradeRow {
                value: trade.value(),
                timestamp: trade.timestamp,
                ticker: trade.ticker,
                quantity: trade.quantity,
                price: trade.price,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use dashboard_core::StoreError;
    use dashboard_core::domain::{FailMode, LimitPolicy, PolicyTable, Trade};
    use dashboard_core::ports::{BacktestEngine, ComputationError, CounterStore};
    use dashboard_infra::{FixedWindowRateLimiter, InMemoryCounterStore, ManualClock, RateLimitConfig};

    use crate::config::IdentityConfig;
    use crate::handlers::configure_routes;

    const KEY: &str = "rate_limit:backtest:1.2.3.4";

    /// Engine returning a canned outcome and counting invocations.
    struct StaticEngine {
        outcome: BacktestOutcome,
        calls: AtomicUsize,
    }

    impl StaticEngine {
        fn new(trades: Vec<Trade>) -> Arc<Self> {
            Arc::new(Self {
                outcome: BacktestOutcome {
                    n_trades: trades.len() as u64,
                    trades,
                },
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BacktestEngine for StaticEngine {
        async fn run(&self, _params: &BacktestParams) -> Result<BacktestOutcome, ComputationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.clone())
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl BacktestEngine for FailingEngine {
        async fn run(&self, _params: &BacktestParams) -> Result<BacktestOutcome, ComputationError> {
            Err(ComputationError::Failed {
                code: Some(1),
                stderr: "Data loading error: rate limited by data vendor".to_string(),
            })
        }
    }

    struct DownStore;

    #[async_trait]
    impl CounterStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<u64>, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn incr_and_expire(&self, _key: &str, _ttl: Option<Duration>) -> Result<u64, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }
    }

    fn sample_trade() -> Trade {
        Trade {
            timestamp: "2024-01-02 00:00:00 UTC".to_string(),
            ticker: "AAPL".to_string(),
            quantity: 100,
            price: 185.5,
        }
    }

    fn state(store: Arc<dyn CounterStore>, engine: Arc<dyn BacktestEngine>, fail_mode: FailMode) -> AppState {
        let config = RateLimitConfig {
            policies: PolicyTable::new(LimitPolicy::per_seconds(10, 3600).unwrap()),
            fail_mode,
            ..RateLimitConfig::default()
        };
        let limiter = Arc::new(FixedWindowRateLimiter::new(store, config));
        AppState::from_parts(limiter, engine, IdentityConfig::default(), fail_mode)
    }

    fn backtest_request(body: Value) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/backtests")
            .peer_addr("1.2.3.4:40000".parse().unwrap())
            .set_json(body)
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(actix_web::web::Data::new($state))
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_twelve_requests_ten_allowed_then_fresh_window() {
        let clock = ManualClock::default();
        let store = Arc::new(InMemoryCounterStore::with_clock(Arc::new(clock.clone())));
        let engine = StaticEngine::new(vec![sample_trade()]);
        let app = app!(state(store.clone(), engine.clone(), FailMode::Closed));

        let mut statuses = Vec::new();
        for _ in 0..12 {
            let resp = test::call_service(&app, backtest_request(json!({})).to_request()).await;
            statuses.push(resp.status());
        }

        assert!(statuses[..10].iter().all(|s| *s == StatusCode::OK));
        assert!(statuses[10..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(engine.calls(), 10);
        assert_eq!(store.get(KEY).await.unwrap(), Some(10));

        clock.advance(Duration::from_secs(3601));

        let resp = test::call_service(&app, backtest_request(json!({})).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(store.get(KEY).await.unwrap(), Some(1));
    }

    #[actix_web::test]
    async fn test_throttled_response_body_and_headers() {
        let clock = ManualClock::default();
        let store = Arc::new(InMemoryCounterStore::with_clock(Arc::new(clock.clone())));
        let app = app!(state(store, StaticEngine::new(vec![]), FailMode::Closed));

        for _ in 0..10 {
            test::call_service(&app, backtest_request(json!({})).to_request()).await;
        }
        clock.advance(Duration::from_secs(600));

        let resp = test::call_service(&app, backtest_request(json!({})).to_request()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get("Retry-After").unwrap(), "3000");

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 429);
        assert_eq!(body["detail"], "Rate limit exceeded. Try again later.");
        assert_eq!(body["retry_after"], 3000);
    }

    #[actix_web::test]
    async fn test_success_renders_trades() {
        let store = Arc::new(InMemoryCounterStore::new());
        let app = app!(state(store, StaticEngine::new(vec![sample_trade()]), FailMode::Closed));

        let resp = test::call_service(&app, backtest_request(json!({"ticker": "aapl"})).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["n_trades"], 1);
        assert_eq!(body["data"]["trades"][0]["value"], 18_550.0);
        assert!(body.get("message").is_none());
    }

    #[actix_web::test]
    async fn test_empty_result_carries_message() {
        let store = Arc::new(InMemoryCounterStore::new());
        let app = app!(state(store, StaticEngine::new(vec![]), FailMode::Closed));

        let resp = test::call_service(&app, backtest_request(json!({})).to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["n_trades"], 0);
        assert_eq!(body["message"], NO_TRADES_MESSAGE);
    }

    #[actix_web::test]
    async fn test_invalid_form_does_not_consume_quota() {
        let store = Arc::new(InMemoryCounterStore::new());
        let engine = StaticEngine::new(vec![]);
        let app = app!(state(store.clone(), engine.clone(), FailMode::Closed));

        for body in [
            json!({"window": 0}),
            json!({"strategy": "buy_and_hold"}),
            json!({"ticker": "   "}),
            json!({"window": "ninety"}),
        ] {
            let resp = test::call_service(&app, backtest_request(body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        assert_eq!(store.get(KEY).await.unwrap(), None);
        assert_eq!(engine.calls(), 0);
    }

    #[actix_web::test]
    async fn test_engine_failure_is_bad_gateway_and_consumes_quota() {
        let store = Arc::new(InMemoryCounterStore::new());
        let app = app!(state(store.clone(), Arc::new(FailingEngine), FailMode::Closed));

        let resp = test::call_service(&app, backtest_request(json!({})).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["detail"],
            "Backtest failed: Data loading error: rate limited by data vendor"
        );
        assert_eq!(store.get(KEY).await.unwrap(), Some(1));
    }

    #[actix_web::test]
    async fn test_store_down_fails_closed() {
        let engine = StaticEngine::new(vec![]);
        let app = app!(state(Arc::new(DownStore), engine.clone(), FailMode::Closed));

        let resp = test::call_service(&app, backtest_request(json!({})).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(engine.calls(), 0);
    }

    #[actix_web::test]
    async fn test_store_down_fails_open_when_configured() {
        let engine = StaticEngine::new(vec![]);
        let app = app!(state(Arc::new(DownStore), engine.clone(), FailMode::Open));

        let resp = test::call_service(&app, backtest_request(json!({})).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(engine.calls(), 1);
    }

    #[actix_web::test]
    async fn test_distinct_callers_have_separate_quotas() {
        let store = Arc::new(InMemoryCounterStore::new());
        let app = app!(state(store.clone(), StaticEngine::new(vec![]), FailMode::Closed));

        for _ in 0..11 {
            test::call_service(&app, backtest_request(json!({})).to_request()).await;
        }

        let other = test::TestRequest::post()
            .uri("/api/backtests")
            .peer_addr("5.6.7.8:40000".parse().unwrap())
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, other).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(store.get(KEY).await.unwrap(), Some(10));
    }

    #[actix_web::test]
    async fn test_list_strategies() {
        let app = app!(state(
            Arc::new(InMemoryCounterStore::new()),
            StaticEngine::new(vec![]),
            FailMode::Closed
        ));

        let req = test::TestRequest::get().uri("/api/strategies").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"][0]["value"], "ma_crossover");
        assert_eq!(body["data"][0]["label"], "MA Crossover");
    }

    #[actix_web::test]
    async fn test_health_reports_fail_mode() {
        let app = app!(state(
            Arc::new(InMemoryCounterStore::new()),
            StaticEngine::new(vec![]),
            FailMode::Closed
        ));

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["rate_limit_fail_mode"], "closed");
    }
}
