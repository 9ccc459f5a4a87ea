//! Mask endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use maskr::{
    UserId,
    masks::{AddMaskRequest, MaskStatusRequest, MaskSummary},
    security::RateLimitConfig,
};

use super::{
    AppState,
    error::{ApiError, ApiJson, Envelope},
    rate_limit::{Access, enforce},
};

/// List the caller's masks, newest first.
pub async fn list_masks(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Vec<MaskSummary>>, ApiError> {
    enforce(&state, "masks", &user_id.to_string(), RateLimitConfig::user_read(), Access::Read)
        .await?;

    Ok(Json(state.masks.list(user_id).await?))
}

/// Create a mask.
///
/// # Request Body
///
/// ```json
/// { "name": "shopping", "domain": "maskr.app", "email": "alice@example.com" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: malformed address, taken mask, or a forward-to address
///   that is not the caller's or is not verified
/// - `404 Not Found`: domain is not allow-listed
pub async fn add_mask(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    ApiJson(payload): ApiJson<AddMaskRequest>,
) -> Result<Json<MaskSummary>, ApiError> {
    enforce(
        &state,
        "masks_create",
        &user_id.to_string(),
        RateLimitConfig::user_create(),
        Access::Mutation,
    )
    .await?;

    Ok(Json(state.masks.add(user_id, &payload).await?))
}

/// Delete a mask.
pub async fn delete_mask(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(mask): Path<String>,
) -> Result<Json<Envelope>, ApiError> {
    enforce(
        &state,
        "masks_modify",
        &user_id.to_string(),
        RateLimitConfig::user_modify(),
        Access::Mutation,
    )
    .await?;

    state.masks.delete(user_id, &mask).await?;
    Ok(Envelope::ok("Mask has been deleted"))
}

/// Enable or disable forwarding.
pub async fn set_mask_status(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(mask): Path<String>,
    ApiJson(payload): ApiJson<MaskStatusRequest>,
) -> Result<Json<Envelope>, ApiError> {
    enforce(
        &state,
        "masks_modify",
        &user_id.to_string(),
        RateLimitConfig::user_modify(),
        Access::Mutation,
    )
    .await?;

    state
        .masks
        .set_status(user_id, &mask, payload.enabled)
        .await?;
    let message = if payload.enabled {
        "Mask has been enabled"
    } else {
        "Mask has been disabled"
    };
    Ok(Envelope::ok(message))
}
