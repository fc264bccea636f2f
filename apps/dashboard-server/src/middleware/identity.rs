//! Caller identity extractor for rate limiting.
//!
//! Identity is not authenticated: it is whatever the request presents,
//! resolved per [`IdentityConfig`].

use std::fmt;
use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};

use crate::config::IdentityConfig;
use crate::middleware::error::AppError;
use crate::state::AppState;

/// Prefix for header-derived identities, so an API key can never collide
/// with an address.
const KEY_IDENTITY_PREFIX: &str = "key:";

/// Caller identity used as the rate limit dimension.
///
/// ```ignore
/// async fn gated(identity: ClientIdentity) -> impl Responder {
///     format!("limited as {}", identity)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn resolve(req: &HttpRequest, config: &IdentityConfig) -> Option<Self> {
        if let Some(name) = &config.header {
            let key = req
                .headers()
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(key) = key {
                return Some(Self(format!("{}{}", KEY_IDENTITY_PREFIX, key)));
            }
        }

        if config.trust_forwarded {
            return req
                .connection_info()
                .realip_remote_addr()
                .map(|addr| Self(addr.to_string()));
        }

        req.peer_addr().map(|addr| Self(addr.ip().to_string()))
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromRequest for ClientIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let config = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.identity.clone())
            .unwrap_or_default();

        match Self::resolve(req, &config) {
            Some(identity) => ready(Ok(identity)),
            None => {
                tracing::warn!("Could not determine client identity");
                ready(Err(AppError::BadRequest(
                    "Unable to determine client identity".to_string(),
                )))
            }
        }
    }
}
