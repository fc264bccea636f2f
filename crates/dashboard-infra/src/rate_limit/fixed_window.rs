//! Fixed-window rate limiter over a shared counter store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use dashboard_core::domain::{
    ActionName, CounterKey, DEFAULT_KEY_PREFIX, Decision, FailMode, Identity, LimitPolicy,
    PolicyTable,
};
use dashboard_core::ports::{CounterStore, RateLimitError, RateLimiter};
use dashboard_core::{DomainError, StoreError};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Default policy and per-action overrides.
    pub policies: PolicyTable,
    /// Behaviour when the counter store cannot answer.
    pub fail_mode: FailMode,
    /// Namespace for counter keys.
    pub key_prefix: String,
    /// Upper bound on each store round trip.
    pub store_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            policies: PolicyTable::default(),
            fail_mode: FailMode::Closed,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            store_timeout: Duration::from_millis(500),
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from environment variables.
    ///
    /// Limits and the fail mode must be valid when present; a typo here
    /// must not silently change who gets admitted.
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_vars(std::env::vars())
    }

    /// Build from `(name, value)` pairs. Per-action overrides use
    /// `RATE_LIMIT_POLICY_<ACTION>=<max_requests>,<period_secs>`.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, DomainError> {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let lookup = |name: &str| {
            vars.iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.trim().to_string())
        };

        let max_requests = match lookup("RATE_LIMIT_MAX_REQUESTS") {
            Some(raw) => parse_number::<u32>("RATE_LIMIT_MAX_REQUESTS", &raw)?,
            None => LimitPolicy::default().max_requests(),
        };
        let period_secs = match lookup("RATE_LIMIT_PERIOD_SECS") {
            Some(raw) => parse_number::<u64>("RATE_LIMIT_PERIOD_SECS", &raw)?,
            None => LimitPolicy::default().period().as_secs(),
        };

        let mut policies = PolicyTable::new(LimitPolicy::per_seconds(max_requests, period_secs)?);
        for (key, value) in &vars {
            if let Some(action) = key.strip_prefix("RATE_LIMIT_POLICY_") {
                let action = ActionName::parse(&action.to_lowercase())?;
                policies = policies.with_override(action, parse_policy(key, value)?);
            }
        }

        let fail_mode = match lookup("RATE_LIMIT_FAIL_MODE") {
            Some(raw) => raw.parse()?,
            None => FailMode::default(),
        };

        let store_timeout = match lookup("RATE_LIMIT_STORE_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_number::<u64>("RATE_LIMIT_STORE_TIMEOUT_MS", &raw)?),
            None => Duration::from_millis(500),
        };

        Ok(Self {
            policies,
            fail_mode,
            key_prefix: lookup("RATE_LIMIT_KEY_PREFIX")
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            store_timeout,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, DomainError> {
    raw.parse()
        .map_err(|_| DomainError::Validation(format!("{} must be a number, got '{}'", name, raw)))
}

/// Format: `<max_requests>,<period_secs>`.
fn parse_policy(name: &str, raw: &str) -> Result<LimitPolicy, DomainError> {
    let (max, period) = raw.split_once(',').ok_or_else(|| {
        DomainError::Validation(format!(
            "{} must be '<max_requests>,<period_secs>', got '{}'",
            name, raw
        ))
    })?;
    LimitPolicy::per_seconds(
        parse_number(name, max.trim())?,
        parse_number(name, period.trim())?,
    )
}

/// Fixed-window counter limiter.
///
/// Reads the window's count, denies at the limit without counting, and
/// otherwise increments. The store attaches the expiry to whichever
/// increment creates the key, in the same atomic step, so a window that
/// lapses between the read and the increment is reopened with a full
/// period. The window is never extended afterwards, so a caller can burst
/// up to twice the limit across a window boundary.
///
/// The read and the increment are separate round trips. Callers racing on
/// one key can all pass the read, overshooting the limit by up to the number
/// of racers minus one; the next window starts clean.
///
/// Holds no counts locally. All shared state lives in the store.
pub struct FixedWindowRateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl FixedWindowRateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn counter_key(&self, action: &ActionName, identity: &Identity) -> CounterKey {
        CounterKey::new(&self.config.key_prefix, action, identity)
    }

    /// Admission check against an explicit policy instead of the table.
    pub async fn check_and_record_with(
        &self,
        identity: &Identity,
        action: &ActionName,
        policy: &LimitPolicy,
    ) -> Result<Decision, RateLimitError> {
        let key = self.counter_key(action, identity);

        match self.evaluate(&key, policy).await {
            Ok(decision) => Ok(decision),
            Err(e) => match self.config.fail_mode {
                FailMode::Open => {
                    tracing::warn!(
                        identity = %identity,
                        action = %action,
                        error = %e,
                        "Rate limit store unavailable, failing open"
                    );
                    Ok(Decision::Allowed)
                }
                FailMode::Closed => {
                    tracing::error!(
                        identity = %identity,
                        action = %action,
                        error = %e,
                        "Rate limit store unavailable, failing closed"
                    );
                    Err(RateLimitError::StoreUnavailable(e))
                }
            },
        }
    }

    async fn evaluate(&self, key: &CounterKey, policy: &LimitPolicy) -> Result<Decision, StoreError> {
        let count = self
            .bounded(self.store.get(key.as_str()))
            .await?
            .unwrap_or(0);
        let limit = u64::from(policy.max_requests());

        if count >= limit {
            tracing::debug!(key = %key, count, limit, "Rate limit reached, denying");
            return Ok(Decision::Denied);
        }

        let new_count = self
            .bounded(self.store.incr_and_expire(key.as_str(), Some(policy.period())))
            .await?;

        tracing::debug!(key = %key, count = new_count, limit, "Request admitted");
        Ok(Decision::Allowed)
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.config.store_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(self.config.store_timeout))?
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn check_and_record(
        &self,
        identity: &str,
        action: &str,
    ) -> Result<Decision, RateLimitError> {
        let identity = Identity::parse(identity)?;
        let action = ActionName::parse(action)?;
        let policy = *self.config.policies.policy_for(&action);

        self.check_and_record_with(&identity, &action, &policy).await
    }

    async fn retry_after(
        &self,
        identity: &str,
        action: &str,
    ) -> Result<Option<Duration>, RateLimitError> {
        let identity = Identity::parse(identity)?;
        let action = ActionName::parse(action)?;
        let key = self.counter_key(&action, &identity);

        Ok(self.bounded(self.store.ttl(key.as_str())).await?)
    }
}
