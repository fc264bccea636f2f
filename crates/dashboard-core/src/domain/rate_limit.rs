//! Admission-control vocabulary: who is limited, for what, and how much.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Default namespace for counter keys.
pub const DEFAULT_KEY_PREFIX: &str = "rate_limit";

/// Longest accepted window: one year.
pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

/// Caller identity used for quota accounting (network address, API key, ...).
///
/// Opaque to the limiter. The only normalization applied is trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Validation(
                "identity must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a limited operation. One store can serve several quotas.
///
/// Must not contain `:` or whitespace, so the action segment of a
/// [`CounterKey`] always ends at the first separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionName(String);

impl ActionName {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Validation(
                "action name must not be empty".to_string(),
            ));
        }
        if trimmed.chars().any(|c| c == ':' || c.is_whitespace()) {
            return Err(DomainError::Validation(format!(
                "action name '{}' must not contain ':' or whitespace",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store key holding one window's count: `{prefix}:{action}:{identity}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey(String);

impl CounterKey {
    pub fn new(prefix: &str, action: &ActionName, identity: &Identity) -> Self {
        Self(format!("{}:{}:{}", prefix, action, identity))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `max_requests` admissions per `period`, fixed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    max_requests: u32,
    period: Duration,
}

impl LimitPolicy {
    /// Store expiry has second granularity, so the period must be whole
    /// seconds, at least one and at most [`MAX_PERIOD_SECS`].
    pub fn new(max_requests: u32, period: Duration) -> Result<Self, DomainError> {
        if max_requests == 0 {
            return Err(DomainError::Validation(
                "max_requests must be at least 1".to_string(),
            ));
        }
        if period.as_secs() == 0 || period.subsec_nanos() != 0 {
            return Err(DomainError::Validation(format!(
                "period must be a positive whole number of seconds, got {:?}",
                period
            )));
        }
        if period.as_secs() > MAX_PERIOD_SECS {
            return Err(DomainError::Validation(format!(
                "period must be at most {} seconds, got {}",
                MAX_PERIOD_SECS,
                period.as_secs()
            )));
        }
        Ok(Self {
            max_requests,
            period,
        })
    }

    pub fn per_seconds(max_requests: u32, period_secs: u64) -> Result<Self, DomainError> {
        Self::new(max_requests, Duration::from_secs(period_secs))
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for LimitPolicy {
    /// Ten backtests per hour.
    fn default() -> Self {
        Self {
            max_requests: 10,
            period: Duration::from_secs(3600),
        }
    }
}

/// Default policy plus per-action overrides.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    default: LimitPolicy,
    overrides: HashMap<ActionName, LimitPolicy>,
}

impl PolicyTable {
    pub fn new(default: LimitPolicy) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, action: ActionName, policy: LimitPolicy) -> Self {
        self.overrides.insert(action, policy);
        self
    }

    pub fn policy_for(&self, action: &ActionName) -> &LimitPolicy {
        self.overrides.get(action).unwrap_or(&self.default)
    }

    pub fn default_policy(&self) -> &LimitPolicy {
        &self.default
    }
}

/// Outcome of an admission check. Denial carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// What the limiter does when the counter store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Admit the request and log the failure.
    Open,
    /// Report `StoreUnavailable`; callers treat it as a denial.
    #[default]
    Closed,
}

impl FromStr for FailMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailMode::Open),
            "closed" => Ok(FailMode::Closed),
            other => Err(DomainError::Validation(format!(
                "fail mode must be 'open' or 'closed', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for FailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailMode::Open => f.write_str("open"),
            FailMode::Closed => f.write_str("closed"),
        }
    }
}
