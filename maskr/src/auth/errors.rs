//! Authentication error types.

use crate::captcha::CaptchaError;
use crate::db::StoreError;
use crate::mailer::MailerError;
use crate::oauth::OAuthError;
use crate::security::{CredentialError, RevocationError};
use crate::token::TokenError;
use crate::verification::VerificationError;
use thiserror::Error;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Database error
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    /// Token could not be issued or validated
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Code lifecycle rejection
    #[error("{0}")]
    Verification(#[from] VerificationError),

    /// Password or code hashing failed
    #[error("Hashing error: {0}")]
    Hashing(#[from] CredentialError),

    /// Mail provider failure
    #[error("Mail delivery failed: {0}")]
    Mailer(#[from] MailerError),

    /// CAPTCHA provider failure
    #[error("Captcha provider error: {0}")]
    Captcha(#[from] CaptchaError),

    /// OAuth provider failure
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Revocation ledger unavailable
    #[error("Revocation ledger error: {0}")]
    Ledger(#[from] RevocationError),

    #[error("Invalid email")]
    InvalidEmail,

    #[error("Password does not meet requirements")]
    WeakPassword,

    /// CAPTCHA checked and rejected
    #[error("Captcha failed. Try again.")]
    CaptchaFailed,

    #[error("OAuth sign-in is not configured")]
    OAuthDisabled,

    #[error("Email is already in use")]
    EmailInUse,

    /// Unknown email or wrong password; deliberately indistinguishable
    #[error("Incorrect login details")]
    IncorrectLogin,

    #[error("There's no account associated with this email address")]
    NoAccount,

    #[error("The user that is associated with your token no longer exists")]
    UserNotFound,

    #[error("Token version mismatch")]
    TokenVersionMismatch,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("You cannot use your previous password")]
    PasswordReused,

    #[error("Your account email is not verified with the provider")]
    UnverifiedProviderEmail,
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Store, provider and token internals are replaced with generic messages.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Store(_)
            | AuthError::Hashing(_)
            | AuthError::Captcha(_)
            | AuthError::Ledger(_) => "Something went wrong".to_string(),
            AuthError::Mailer(_) => "Could not send the code, try again later.".to_string(),
            AuthError::OAuth(_) => "Google token exchange error".to_string(),
            AuthError::Token(TokenError::Expired) => "Token is expired".to_string(),
            AuthError::Token(TokenError::TypeMismatch { .. }) => "Token mismatch".to_string(),
            AuthError::Token(_) => "Invalid token".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the failure originates outside the caller's control
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Store(_)
                | AuthError::Hashing(_)
                | AuthError::Mailer(_)
                | AuthError::Captcha(_)
                | AuthError::OAuth(_)
                | AuthError::Ledger(_)
                | AuthError::Token(TokenError::Encoding(_))
        )
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
