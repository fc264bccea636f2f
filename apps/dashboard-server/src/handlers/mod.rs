//! HTTP handlers and route configuration.

mod backtest;
mod health;

use actix_web::web;

use crate::middleware::error::AppError;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            .route("/strategies", web::get().to(backtest::list_strategies))
            // Rate limited
            .route("/backtests", web::post().to(backtest::run_backtest)),
    );
}
