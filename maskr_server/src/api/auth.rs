//! Authentication API handlers.
//!
//! Signup, sign-in and password reset. Every handler charges the rate limiter
//! before doing any work: pre-auth routes by the request-body email, the OAuth
//! callback and the reset confirmation by client IP.
//!
//! # Examples
//!
//! Request a signup code:
//! ```bash
//! curl -X POST http://localhost:3000/auth/signup \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "alice@example.com", "captcha_token": "..."}'
//! ```

use axum::{Json, extract::State};
use maskr::{
    TokenPair,
    auth::{
        AuthError, CreateAccountRequest, LoginRequest, OAuthLoginRequest, PasswordResetConfirm,
        PasswordResetRequest, PasswordResetVerify, SignupOutcome, SignupRequest,
        VerifySignupRequest,
    },
    emails::normalize_address,
    security::RateLimitConfig,
};
use serde::Serialize;

use super::{
    AppState,
    error::{ApiError, ApiJson, Envelope},
    rate_limit::{Access, ClientIp, enforce},
};
use crate::{logging::log_security_event, metrics};

#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub success: bool,
    pub token: String,
}

/// Request a signup code.
///
/// # Response
///
/// `200 OK` with `{"success": true, "message": ...}` both when a code was sent
/// and when a live code already exists.
///
/// # Errors
///
/// - `400 Bad Request`: malformed email, CAPTCHA failure or email already in use
/// - `429 Too Many Requests`: 3 requests per minute per email
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let identity = normalize_address(&payload.email);
    enforce(&state, "signup", &identity, RateLimitConfig::signup(), Access::Mutation).await?;

    let message = match state.auth.request_signup(&payload).await? {
        SignupOutcome::CodeSent => "A verification code has been sent to your email",
        SignupOutcome::AlreadyPending => "A verification code has already been sent",
    };
    Ok(Envelope::ok(message))
}

/// Replace the pending signup code and send it again.
pub async fn resend_signup_code(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let identity = normalize_address(&payload.email);
    enforce(&state, "signup", &identity, RateLimitConfig::signup(), Access::Mutation).await?;

    state.auth.resend_signup_code(&payload).await?;
    Ok(Envelope::ok("A new verification code has been sent"))
}

/// Check a signup code without consuming it.
pub async fn verify_signup_code(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<VerifySignupRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let identity = normalize_address(&payload.email);
    enforce(
        &state,
        "create_account",
        &identity,
        RateLimitConfig::create_account(),
        Access::Mutation,
    )
    .await?;

    state.auth.verify_signup_code(&payload).await?;
    Ok(Envelope::ok("Code is valid"))
}

/// Create the account and sign in.
///
/// # Response
///
/// `200 OK` with `{"access_token": {...}, "refresh_token": {...}}`.
pub async fn create_account(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateAccountRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let identity = normalize_address(&payload.email);
    enforce(
        &state,
        "create_account",
        &identity,
        RateLimitConfig::create_account(),
        Access::Mutation,
    )
    .await?;

    Ok(Json(state.auth.create_account(&payload).await?))
}

/// Email and password sign-in.
///
/// # Errors
///
/// - `401 Unauthorized`: unknown email or wrong password ("Incorrect login details")
/// - `429 Too Many Requests`: 7 attempts per minute per email
pub async fn sign_in_with_email(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let identity = normalize_address(&payload.email);
    enforce(&state, "sign_in", &identity, RateLimitConfig::sign_in(), Access::Mutation).await?;

    match state.auth.sign_in_with_email(&payload).await {
        Ok(pair) => {
            metrics::login_attempts_total("email", true);
            Ok(Json(pair))
        }
        Err(e) => {
            metrics::login_attempts_total("email", false);
            if matches!(e, AuthError::IncorrectLogin) {
                log_security_event("failed_login", None, Some(&identity), "Incorrect login details");
            }
            Err(e.into())
        }
    }
}

/// Google sign-in with an authorization code.
pub async fn sign_in_with_google(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(payload): ApiJson<OAuthLoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    enforce(&state, "sign_in", ip.as_str(), RateLimitConfig::sign_in(), Access::Mutation).await?;

    let result = state.auth.sign_in_with_oauth(&payload).await;
    metrics::login_attempts_total("google", result.is_ok());
    Ok(Json(result?))
}

/// Mail a password-reset code.
pub async fn request_password_reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<PasswordResetRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let identity = normalize_address(&payload.email);
    enforce(
        &state,
        "password_reset",
        &identity,
        RateLimitConfig::password_reset(),
        Access::Mutation,
    )
    .await?;

    state.auth.request_password_reset(&payload).await?;
    Ok(Envelope::ok("A reset code has been sent to your email"))
}

/// Exchange a reset code for a reset token.
///
/// # Response
///
/// `200 OK` with `{"success": true, "token": "..."}`.
pub async fn verify_password_reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<PasswordResetVerify>,
) -> Result<Json<ResetTokenResponse>, ApiError> {
    let identity = normalize_address(&payload.email);
    enforce(
        &state,
        "password_reset",
        &identity,
        RateLimitConfig::password_reset(),
        Access::Mutation,
    )
    .await?;

    let token = state.auth.verify_password_reset(&payload).await?;
    Ok(Json(ResetTokenResponse {
        success: true,
        token,
    }))
}

/// Set a new password with a reset token.
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(payload): ApiJson<PasswordResetConfirm>,
) -> Result<Json<Envelope>, ApiError> {
    enforce(
        &state,
        "password_reset",
        ip.as_str(),
        RateLimitConfig::password_reset(),
        Access::Mutation,
    )
    .await?;

    match state.auth.confirm_password_reset(&payload).await {
        Err(AuthError::TokenVersionMismatch) => {
            log_security_event(
                "version_mismatch",
                None,
                Some(ip.as_str()),
                "Stale password reset token",
            );
            Err(AuthError::TokenVersionMismatch.into())
        }
        result => {
            result?;
            Ok(Envelope::ok("Your password has been reset"))
        }
    }
}
