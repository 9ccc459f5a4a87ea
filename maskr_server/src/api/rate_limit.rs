//! Request admission for API routes.
//!
//! Identity selection: the authenticated user id on user routes, the normalized
//! request-body email on pre-auth routes, the client IP everywhere else. When
//! the counter store is unreachable, state-mutating routes are rejected and
//! reads are admitted.

use axum::{extract::FromRequestParts, extract::ConnectInfo, http::request::Parts};
use maskr::security::{RateLimitConfig, RateLimitResult};
use std::net::SocketAddr;

use super::{AppState, error::ApiError};
use crate::{logging::log_security_event, metrics};

/// Header set by the reverse proxy in production
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// What a failed counter store means for the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Idempotent read; admitted when the store is down
    Read,
    /// State-mutating request; rejected when the store is down
    Mutation,
}

/// Client address used as the rate limit identity of public routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if state.production {
            return parts
                .headers
                .get(REAL_IP_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|ip| ClientIp(ip.trim().to_string()))
                .filter(|ip| !ip.0.is_empty())
                .ok_or_else(|| ApiError::Internal(format!("Missing {} header", REAL_IP_HEADER)));
        }

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientIp(ip))
    }
}

/// Charge one request to `identity` on `route`
///
/// # Errors
///
/// * `ApiError::RateLimited` - the window budget is spent
/// * `ApiError::RateLimiterUnavailable` - store failure on a [`Access::Mutation`] route
pub async fn enforce(
    state: &AppState,
    route: &str,
    identity: &str,
    config: RateLimitConfig,
    access: Access,
) -> Result<(), ApiError> {
    match state
        .rate_limiter
        .check_and_record(route, identity, &config)
        .await
    {
        Ok(RateLimitResult::Allowed { .. }) => Ok(()),
        Ok(RateLimitResult::Locked { retry_after }) => {
            metrics::rate_limit_hits_total(route);
            log_security_event("rate_limited", None, Some(identity), route);
            Err(ApiError::RateLimited { retry_after })
        }
        Err(e) => {
            tracing::error!(route = route, identity = identity, "Rate limiter failed: {}", e);
            match access {
                Access::Read => Ok(()),
                Access::Mutation => Err(ApiError::RateLimiterUnavailable),
            }
        }
    }
}
