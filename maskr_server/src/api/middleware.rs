//! Authentication middleware for protected endpoints.
//!
//! Extracts the access token from the `Authorization: Bearer <token>` header,
//! validates it and injects the authenticated [`UserId`] into request
//! extensions for downstream handlers.
//!
//! # Extracting User ID
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use maskr::UserId;
//!
//! async fn protected_handler(Extension(user_id): Extension<UserId>) -> String {
//!     format!("Authenticated as user {}", user_id)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use maskr::UserId;

use super::{AppState, error::ApiError};

/// Authentication middleware that validates access tokens and injects the user ID.
///
/// # Behavior
///
/// - **Success**: Token valid → Injects `UserId` into request extensions → Calls next handler
/// - **Missing header or bad format**: Returns `401 Unauthorized`
/// - **Invalid, expired or refresh token**: Returns `401 Unauthorized`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = state.sessions.authenticate(token)?;
    request.extensions_mut().insert::<UserId>(claims.id);

    Ok(next.run(request).await)
}
