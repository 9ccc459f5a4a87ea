//! Session token endpoints.

use axum::{Json, extract::State};
use maskr::{auth::AuthError, security::RateLimitConfig, token::Token};
use serde::Deserialize;

use super::{
    AppState,
    error::{ApiError, ApiJson, Envelope},
    rate_limit::{Access, ClientIp, enforce},
};
use crate::{logging::log_security_event, metrics};

#[derive(Debug, Deserialize)]
pub struct RefreshTokenPayload {
    pub refresh_token: String,
}

/// Exchange a refresh token for a new access token.
///
/// # Errors
///
/// - `401 Unauthorized`: invalid, expired, revoked or outdated refresh token
/// - `500 Internal Server Error`: revocation ledger unreachable
pub async fn refresh(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(payload): ApiJson<RefreshTokenPayload>,
) -> Result<Json<Token>, ApiError> {
    enforce(&state, "token", ip.as_str(), RateLimitConfig::sign_in(), Access::Mutation).await?;

    let result = state.sessions.refresh(&payload.refresh_token).await;
    metrics::token_refreshes_total(result.is_ok());

    match result {
        Ok(token) => Ok(Json(token)),
        Err(e) => {
            match &e {
                AuthError::TokenRevoked => log_security_event(
                    "token_revoked",
                    None,
                    Some(ip.as_str()),
                    "Revoked refresh token presented",
                ),
                AuthError::TokenVersionMismatch => log_security_event(
                    "version_mismatch",
                    None,
                    Some(ip.as_str()),
                    "Outdated refresh token presented",
                ),
                _ => {}
            }
            Err(e.into())
        }
    }
}

/// Revoke a refresh token.
///
/// Revoking an already revoked or expired token succeeds.
///
/// # Errors
///
/// - `400 Bad Request`: the token is not a valid refresh token
pub async fn revoke(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(payload): ApiJson<RefreshTokenPayload>,
) -> Result<Json<Envelope>, ApiError> {
    enforce(&state, "token", ip.as_str(), RateLimitConfig::sign_in(), Access::Mutation).await?;

    match state.sessions.revoke(&payload.refresh_token).await {
        Ok(_) => {
            metrics::token_revocations_total();
            Ok(Envelope::ok("Token has been revoked"))
        }
        Err(e @ AuthError::Token(_)) => Err(ApiError::BadRequest(e.client_message())),
        Err(e) => Err(e.into()),
    }
}
