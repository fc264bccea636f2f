//! Rate limiting port - the admission API consumed by gated actions.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::Decision;
use crate::error::{DomainError, StoreError};

/// Rate limiter trait - decides whether `identity` may perform `action` now.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check the caller's window and record the attempt if admitted.
    ///
    /// Denied attempts are not counted. When the backing store fails, the
    /// configured fail mode decides between `Ok(Allowed)` and
    /// `Err(StoreUnavailable)`.
    async fn check_and_record(
        &self,
        identity: &str,
        action: &str,
    ) -> Result<Decision, RateLimitError>;

    /// Time until the caller's current window closes, if one is open.
    async fn retry_after(
        &self,
        identity: &str,
        action: &str,
    ) -> Result<Option<Duration>, RateLimitError>;
}

/// Rate limit errors.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Invalid rate limit input: {0}")]
    InvalidInput(#[from] DomainError),

    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}
