//! # Backtest Dashboard Server
//!
//! Serves the backtest API. Every run goes through the shared rate limiter
//! before the engine process is started.

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env().context("Invalid configuration")?;

    tracing::info!(
        "Starting backtest dashboard server on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(&config)
        .await
        .context("Counter store unavailable at startup")?;

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
