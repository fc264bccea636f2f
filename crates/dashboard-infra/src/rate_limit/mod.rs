//! Rate limiting implementations.

mod fixed_window;

pub use fixed_window::{FixedWindowRateLimiter, RateLimitConfig};
