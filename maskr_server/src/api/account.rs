//! Account endpoint.

use axum::{Extension, Json, extract::State};
use maskr::{UserId, auth::AccountDetails, security::RateLimitConfig};

use super::{
    AppState,
    error::ApiError,
    rate_limit::{Access, enforce},
};

/// Email and display name of the caller.
pub async fn account_details(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<AccountDetails>, ApiError> {
    enforce(
        &state,
        "account",
        &user_id.to_string(),
        RateLimitConfig::user_read(),
        Access::Read,
    )
    .await?;

    Ok(Json(state.auth.account_details(user_id).await?))
}
