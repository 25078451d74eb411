//! Request authentication.
//!
//! Node-to-node routes require the shared secret. Routes used by people
//! accept the PIN or the shared secret. An empty secret or PIN turns the
//! corresponding check off.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use super::error::ApiError;
use super::ApiState;
use crate::{PIN_HEADER, SECRET_HEADER};

/// Credentials a node expects from its callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub secret: String,
    pub pin: String,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            pin: pin.into(),
        }
    }

    /// Whether a node-to-node request may proceed.
    pub fn allows_node(&self, headers: &HeaderMap) -> bool {
        self.secret.is_empty() || header_matches(headers, SECRET_HEADER, &self.secret)
    }

    /// Whether a request from a human client may proceed.
    pub fn allows_user(&self, headers: &HeaderMap) -> bool {
        self.pin.is_empty()
            || header_matches(headers, PIN_HEADER, &self.pin)
            || (!self.secret.is_empty() && header_matches(headers, SECRET_HEADER, &self.secret))
    }
}

fn header_matches(headers: &HeaderMap, name: &str, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected)
}

/// Middleware for `/sync`, `/files` and `/serve`.
pub async fn require_secret(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.allows_node(request.headers()) {
        warn!(path = %request.uri().path(), "Rejected node request without valid secret");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

/// Middleware for the scan and download routes.
pub async fn require_pin(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.allows_user(request.headers()) {
        warn!(path = %request.uri().path(), "Rejected request without valid PIN");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_empty_credentials_disable_checks() {
        let auth = AuthConfig::default();
        assert!(auth.allows_node(&HeaderMap::new()));
        assert!(auth.allows_user(&HeaderMap::new()));
    }

    #[test]
    fn test_node_requires_secret() {
        let auth = AuthConfig::new("s3cret", "1234");
        assert!(!auth.allows_node(&HeaderMap::new()));
        assert!(!auth.allows_node(&headers(&[(PIN_HEADER, "1234")])));
        assert!(auth.allows_node(&headers(&[(SECRET_HEADER, "s3cret")])));
    }

    #[test]
    fn test_user_accepts_pin_or_secret() {
        let auth = AuthConfig::new("s3cret", "1234");
        assert!(auth.allows_user(&headers(&[(PIN_HEADER, "1234")])));
        assert!(auth.allows_user(&headers(&[(SECRET_HEADER, "s3cret")])));
        assert!(!auth.allows_user(&headers(&[(PIN_HEADER, "0000")])));
    }
}
