//! Forwarding address endpoints.
//!
//! All routes require authentication and are rate limited per user.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use maskr::{
    UserId,
    emails::{AddEmailRequest, Email, VerifyEmailRequest},
    security::RateLimitConfig,
};

use super::{
    AppState,
    error::{ApiError, ApiJson, Envelope},
    rate_limit::{Access, enforce},
};

/// List the caller's addresses.
pub async fn list_emails(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Vec<Email>>, ApiError> {
    enforce(&state, "emails", &user_id.to_string(), RateLimitConfig::user_read(), Access::Read)
        .await?;

    Ok(Json(state.emails.list(user_id).await?))
}

/// Add an unverified address and mail its code.
pub async fn add_email(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    ApiJson(payload): ApiJson<AddEmailRequest>,
) -> Result<Json<Email>, ApiError> {
    enforce(
        &state,
        "emails_create",
        &user_id.to_string(),
        RateLimitConfig::user_create(),
        Access::Mutation,
    )
    .await?;

    Ok(Json(state.emails.add(user_id, &payload.email).await?))
}

/// Delete an address that no mask forwards to.
pub async fn delete_email(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(email): Path<String>,
) -> Result<Json<Envelope>, ApiError> {
    enforce(
        &state,
        "emails_modify",
        &user_id.to_string(),
        RateLimitConfig::user_modify(),
        Access::Mutation,
    )
    .await?;

    state.emails.delete(user_id, &email).await?;
    Ok(Envelope::ok("Email has been deleted"))
}

/// Verify an address with its code.
pub async fn verify_email(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(email): Path<String>,
    ApiJson(payload): ApiJson<VerifyEmailRequest>,
) -> Result<Json<Envelope>, ApiError> {
    enforce(
        &state,
        "emails_modify",
        &user_id.to_string(),
        RateLimitConfig::user_modify(),
        Access::Mutation,
    )
    .await?;

    state.emails.verify(user_id, &email, &payload.code).await?;
    Ok(Envelope::ok("Email has been verified"))
}

/// Mail a fresh code for an unverified address.
pub async fn request_email_code(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(email): Path<String>,
) -> Result<Json<Envelope>, ApiError> {
    enforce(
        &state,
        "emails_create",
        &user_id.to_string(),
        RateLimitConfig::user_create(),
        Access::Mutation,
    )
    .await?;

    state.emails.request_code(user_id, &email).await?;
    Ok(Envelope::ok("A verification code has been sent"))
}
