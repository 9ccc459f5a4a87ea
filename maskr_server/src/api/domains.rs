//! Public domain listing.

use axum::{Json, extract::State};
use maskr::{Domain, security::RateLimitConfig};

use super::{
    AppState,
    error::ApiError,
    rate_limit::{Access, ClientIp, enforce},
};

/// Allow-listed mask domains, served from the in-memory snapshot.
pub async fn list_domains(
    State(state): State<AppState>,
    ip: ClientIp,
) -> Result<Json<Vec<Domain>>, ApiError> {
    enforce(&state, "domains", ip.as_str(), RateLimitConfig::user_read(), Access::Read).await?;

    Ok(Json(state.domains.values().await))
}
