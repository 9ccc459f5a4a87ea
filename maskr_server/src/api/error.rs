//! API error type and its HTTP mapping.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use maskr::{
    auth::errors::AuthError,
    emails::EmailError,
    masks::{LookupError, MaskError},
    token::TokenError,
    verification::VerificationError,
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Uniform response envelope for flows without a payload and for every error
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
        })
    }
}

/// Every failure a handler can return
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Mask(#[from] MaskError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("Too many requests, try again later")]
    RateLimited { retry_after: u64 },

    /// Counter store failed on a state-mutating route
    #[error("Rate limiter unavailable")]
    RateLimiterUnavailable,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    /// Server-side misconfiguration, such as a missing proxy header in production
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(e) => auth_status(e),
            ApiError::Email(e) => match e {
                EmailError::Store(_) | EmailError::Hashing(_) | EmailError::Mailer(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                EmailError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::Mask(e) => match e {
                MaskError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                MaskError::DomainNotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::Lookup(e) => match e {
                LookupError::InvalidAddress | LookupError::InvalidDomain => StatusCode::BAD_REQUEST,
                LookupError::NotFound => StatusCode::NOT_FOUND,
                LookupError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::RateLimiterUnavailable | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message returned to the client; never carries store or provider internals
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Auth(e) => e.client_message(),
            ApiError::Email(e) => e.client_message(),
            ApiError::Mask(e) => e.client_message(),
            ApiError::Lookup(LookupError::Unavailable(_)) => "Service unavailable".to_string(),
            ApiError::RateLimiterUnavailable | ApiError::Internal(_) => {
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        }
    }
}

fn auth_status(error: &AuthError) -> StatusCode {
    match error {
        AuthError::Token(TokenError::Encoding(_))
        | AuthError::Store(_)
        | AuthError::Hashing(_)
        | AuthError::Mailer(_)
        | AuthError::Captcha(_)
        | AuthError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::Token(_)
        | AuthError::IncorrectLogin
        | AuthError::UserNotFound
        | AuthError::TokenVersionMismatch
        | AuthError::TokenRevoked => StatusCode::UNAUTHORIZED,
        AuthError::NoAccount | AuthError::Verification(VerificationError::NotFound) => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "Malformed body: {}", rejection.body_text());
        ApiError::BadRequest("Invalid body".to_string())
    }
}

/// JSON body extractor whose rejection is an enveloped 400
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, "Request failed: {}", self);
        } else {
            tracing::debug!(status = %status, "Request rejected: {}", self);
        }

        let body = Json(Envelope {
            success: false,
            message: Some(self.client_message()),
        });

        let mut response = (status, body).into_response();
        if let ApiError::RateLimited { retry_after } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}
