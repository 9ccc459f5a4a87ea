//! Internal mask lookup surface.
//!
//! Served on its own listener for the mail-processing pipeline. Each call takes
//! `{"mask_address": "..."}`. Status codes: invalid argument → 400, unknown
//! mask → 404, store unavailable → 503.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use maskr::masks::{LookupError, LookupResult, MaskLookup};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    error::{ApiError, ApiJson},
    request_id,
};
use crate::metrics;

/// State of the lookup listener
#[derive(Clone)]
pub struct LookupState {
    pub lookup: Arc<MaskLookup>,
}

#[derive(Debug, Deserialize)]
pub struct MaskAddressPayload {
    pub mask_address: String,
}

#[derive(Debug, Serialize)]
pub struct CheckMaskResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct GetMaskResponse {
    pub forward_email: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct Acknowledged {
    pub success: bool,
}

/// Router of the lookup listener
pub fn create_lookup_router(state: LookupState) -> Router {
    Router::new()
        .route("/lookup/check", post(check_mask))
        .route("/lookup/get", post(get_mask))
        .route("/lookup/increment-forwarded", post(increment_forwarded_count))
        .route("/lookup/increment-received", post(increment_received_count))
        .route("/health", get(|| async { "OK" }))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .with_state(state)
}

fn observe<T>(operation: &str, result: LookupResult<T>) -> Result<T, ApiError> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(LookupError::NotFound) => "not_found",
        Err(LookupError::Unavailable(_)) => "unavailable",
        Err(_) => "invalid",
    };
    metrics::mask_lookups_total(operation, outcome);
    Ok(result?)
}

/// Whether a mask exists.
pub async fn check_mask(
    State(state): State<LookupState>,
    ApiJson(payload): ApiJson<MaskAddressPayload>,
) -> Result<Json<CheckMaskResponse>, ApiError> {
    let valid = observe("check", state.lookup.check_mask(&payload.mask_address).await)?;
    Ok(Json(CheckMaskResponse { valid }))
}

/// Forwarding target of a mask.
pub async fn get_mask(
    State(state): State<LookupState>,
    ApiJson(payload): ApiJson<MaskAddressPayload>,
) -> Result<Json<GetMaskResponse>, ApiError> {
    let target = observe("get", state.lookup.get_mask(&payload.mask_address).await)?;
    Ok(Json(GetMaskResponse {
        forward_email: target.email,
        enabled: target.enabled,
    }))
}

/// Count a forwarded message.
pub async fn increment_forwarded_count(
    State(state): State<LookupState>,
    ApiJson(payload): ApiJson<MaskAddressPayload>,
) -> Result<Json<Acknowledged>, ApiError> {
    observe(
        "increment_forwarded",
        state
            .lookup
            .increment_forwarded_count(&payload.mask_address)
            .await,
    )?;
    Ok(Json(Acknowledged { success: true }))
}

/// Count a received message.
pub async fn increment_received_count(
    State(state): State<LookupState>,
    ApiJson(payload): ApiJson<MaskAddressPayload>,
) -> Result<Json<Acknowledged>, ApiError> {
    observe(
        "increment_received",
        state
            .lookup
            .increment_received_count(&payload.mask_address)
            .await,
    )?;
    Ok(Json(Acknowledged { success: true }))
}
