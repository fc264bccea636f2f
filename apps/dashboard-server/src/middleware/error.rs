//! Error handling - RFC 7807 compliant responses.

use std::fmt;
use std::time::Duration;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use dashboard_core::DomainError;
use dashboard_core::ports::{ComputationError, RateLimitError};
use dashboard_shared::ErrorResponse;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    TooManyRequests { retry_after: Option<Duration> },
    ServiceUnavailable(String),
    BadGateway(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::TooManyRequests { .. } => write!(f, "Rate limit exceeded"),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::TooManyRequests { retry_after } => {
                let mut error = ErrorResponse::too_many_requests();
                let mut response = HttpResponse::TooManyRequests();
                response.insert_header(("X-RateLimit-Remaining", "0"));

                if let Some(wait) = retry_after {
                    // Round up so a client never retries inside the window.
                    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                    error = error.with_retry_after(secs);
                    response.insert_header(("Retry-After", secs.to_string()));
                }

                response.json(error)
            }
            AppError::BadRequest(detail) => {
                HttpResponse::build(self.status_code()).json(ErrorResponse::bad_request(detail))
            }
            AppError::ServiceUnavailable(detail) => HttpResponse::build(self.status_code())
                .json(ErrorResponse::service_unavailable(detail)),
            AppError::BadGateway(detail) => {
                HttpResponse::build(self.status_code()).json(ErrorResponse::bad_gateway(detail))
            }
        }
    }
}

// Conversion from domain errors
impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => AppError::BadRequest(msg),
        }
    }
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::InvalidInput(e) => e.into(),
            RateLimitError::StoreUnavailable(e) => {
                tracing::error!("Rate limit store unavailable: {}", e);
                AppError::ServiceUnavailable(
                    "Backtests are temporarily unavailable. Try again later.".to_string(),
                )
            }
        }
    }
}

impl From<ComputationError> for AppError {
    fn from(err: ComputationError) -> Self {
        AppError::BadGateway(format!("Backtest failed: {}", err.diagnostic()))
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
