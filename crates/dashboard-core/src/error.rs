//! Domain-level error types.

use std::time::Duration;

use thiserror::Error;

/// Domain errors - invalid values rejected at construction time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Counter store errors.
///
/// Every variant means the store could not give an authoritative answer;
/// the rate limiter reports all of them as `StoreUnavailable`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Counter store connection failed: {0}")]
    Connection(String),

    #[error("Counter store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Counter store operation failed: {0}")]
    Operation(String),
}
