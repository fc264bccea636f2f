//! Application configuration loaded from environment variables.

use std::env;

use dashboard_core::DomainError;
use dashboard_infra::{RateLimitConfig, SubprocessEngineConfig};

#[cfg(feature = "redis")]
use dashboard_infra::RedisConfig;

/// How the caller identity for rate limiting is derived.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// Header carrying an API key; used when present on a request.
    pub header: Option<String>,
    /// Honour `Forwarded` / `X-Forwarded-For` instead of the peer address.
    /// Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded: bool,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
    pub engine: SubprocessEngineConfig,
    pub identity: IdentityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Fails on malformed rate limit settings rather than guessing.
    pub fn from_env() -> Result<Self, DomainError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8050),
            rate_limit: RateLimitConfig::from_env()?,
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_env(),
            engine: SubprocessEngineConfig::from_env(),
            identity: IdentityConfig {
                header: env::var("RATE_LIMIT_IDENTITY_HEADER")
                    .ok()
                    .filter(|h| !h.trim().is_empty()),
                trust_forwarded: env::var("RATE_LIMIT_TRUST_FORWARDED")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
            },
        })
    }
}
