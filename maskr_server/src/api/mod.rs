//! HTTP API for the maskr relay.
//!
//! # Modules
//!
//! - [`auth`]: signup, sign-in and password reset (public)
//! - [`token`]: refresh and revoke session tokens (public)
//! - [`account`], [`emails`], [`masks`]: the caller's data (requires auth)
//! - [`domains`]: allow-listed mask domains (public)
//! - [`lookup`]: the internal mask lookup listener
//! - [`middleware`]: authentication middleware for protected endpoints
//! - [`rate_limit`]: rate limit identities and failure policy
//!
//! # Endpoints Overview
//!
//! ```text
//! POST   /auth/signup                     POST   /token/refresh
//! POST   /auth/signup/resend              POST   /token/revoke
//! POST   /auth/signup/verify              GET    /account
//! POST   /auth/signup/create              GET    /emails
//! POST   /auth/signin/email               POST   /emails/new
//! POST   /auth/signin/google              DELETE /emails/{email}
//! POST   /auth/reset-password             POST   /emails/{email}/verify
//! POST   /auth/reset-password/verify      POST   /emails/{email}/create-code
//! POST   /auth/reset-password/confirm     GET    /masks
//! GET    /domains                         POST   /masks/new
//! GET    /health                          DELETE /masks/{mask}
//!                                         PUT    /masks/{mask}/status
//! ```
//!
//! Protected routes expect `Authorization: Bearer <access token>`. Responses
//! without a payload, and all errors, use `{"success": bool, "message": "..."}`.

pub mod account;
pub mod auth;
pub mod domains;
pub mod emails;
pub mod error;
pub mod lookup;
pub mod masks;
pub mod middleware;
pub mod rate_limit;
pub mod request_id;
pub mod token;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
};
use maskr::{
    AuthManager, DomainCache, EmailManager, MaskManager, SessionManager, db::HealthCheck,
    kv::KeyValueStore, security::RateLimiter,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every manager sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthManager>,
    pub sessions: Arc<SessionManager>,
    pub emails: Arc<EmailManager>,
    pub masks: Arc<MaskManager>,
    pub domains: Arc<DomainCache>,
    pub rate_limiter: RateLimiter,
    /// Relational store check for `/health`
    pub store: Arc<dyn HealthCheck>,
    /// Key-value store check for `/health`
    pub kv: Arc<dyn KeyValueStore>,
    /// Trust `X-Real-Ip` for client identity
    pub production: bool,
}

/// Create the public API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signup/resend", post(auth::resend_signup_code))
        .route("/auth/signup/verify", post(auth::verify_signup_code))
        .route("/auth/signup/create", post(auth::create_account))
        .route("/auth/signin/email", post(auth::sign_in_with_email))
        .route("/auth/signin/google", post(auth::sign_in_with_google))
        .route("/auth/reset-password", post(auth::request_password_reset))
        .route("/auth/reset-password/verify", post(auth::verify_password_reset))
        .route("/auth/reset-password/confirm", post(auth::confirm_password_reset))
        .route("/token/refresh", post(token::refresh))
        .route("/token/revoke", post(token::revoke))
        .route("/domains", get(domains::list_domains))
        .route("/health", get(health_check));

    let protected_routes = Router::new()
        .route("/account", get(account::account_details))
        .route("/emails", get(emails::list_emails))
        .route("/emails/new", post(emails::add_email))
        .route("/emails/{email}", delete(emails::delete_email))
        .route("/emails/{email}/verify", post(emails::verify_email))
        .route("/emails/{email}/create-code", post(emails::request_email_code))
        .route("/masks", get(masks::list_masks))
        .route("/masks/new", post(masks::add_mask))
        .route("/masks/{mask}", delete(masks::delete_mask))
        .route("/masks/{mask}/status", put(masks::set_mask_status))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when both stores answer, `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:3000/health
/// # {"status":"healthy","database":true,"kv":true,"domains":3,...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = state.store.ping().await.is_ok();
    let kv_healthy = state.kv.ping().await.is_ok();
    let overall_healthy = db_healthy && kv_healthy;

    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "kv": kv_healthy,
        "domains": state.domains.values().await.len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}

#[cfg(test)]
pub(crate) fn test_state(production: bool) -> AppState {
    test_state_with_kv(production, Arc::new(maskr::kv::MemoryKeyValueStore::new()))
}

/// Test state over a counter store the caller keeps a handle to
#[cfg(test)]
pub(crate) fn test_state_with_kv(
    production: bool,
    kv: Arc<maskr::kv::MemoryKeyValueStore>,
) -> AppState {
    use maskr::{
        TokenService,
        captcha::DisabledCaptcha,
        db::MemoryStore,
        mailer::ConsoleMailer,
        security::{CredentialHasher, RateLimitMode, RevocationLedger},
        token::TokenSettings,
    };

    let store = Arc::new(MemoryStore::new());
    let tokens = TokenService::new(
        "test_secret_key_that_is_long_enough_for_hs256",
        TokenSettings::default(),
    );
    let hasher = CredentialHasher::with_params(1024, 1, 1).expect("valid argon2 params");
    let mailer = Arc::new(ConsoleMailer);
    let domains = Arc::new(DomainCache::new(store.clone()));

    AppState {
        auth: Arc::new(AuthManager::new(
            store.clone(),
            store.clone(),
            store.clone(),
            tokens.clone(),
            hasher.clone(),
            mailer.clone(),
            Arc::new(DisabledCaptcha),
        )),
        sessions: Arc::new(SessionManager::new(
            store.clone(),
            tokens,
            RevocationLedger::new(kv.clone()),
        )),
        emails: Arc::new(EmailManager::new(
            store.clone(),
            store.clone(),
            domains.clone(),
            hasher,
            mailer,
        )),
        masks: Arc::new(MaskManager::new(store.clone(), store.clone(), domains.clone())),
        domains,
        rate_limiter: RateLimiter::new(kv.clone(), RateLimitMode::PerRoute),
        store,
        kv,
        production,
    }
}
