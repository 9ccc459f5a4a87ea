//! Authentication data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User ID type
pub type UserId = Uuid;

/// How a session was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Email,
    Google,
}

impl AuthMethod {
    /// Provider name as stored in the `providers` table
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Email => "email",
            AuthMethod::Google => "google",
        }
    }

    /// Parse a stored provider name
    pub fn from_provider_name(name: &str) -> Option<Self> {
        match name {
            "email" => Some(AuthMethod::Email),
            "google" => Some(AuthMethod::Google),
            _ => None,
        }
    }
}

/// User model
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: i32,
    /// Snapshotted into every issued token; bumping it revokes them all
    #[serde(skip_serializing)]
    pub token_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authentication method binding owned by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// Provider-scoped identifier (random for email accounts, subject id for OAuth)
    pub id: String,
    pub method: AuthMethod,
    pub user_id: UserId,
}

/// Everything needed to create a user with its provider and primary email in one step
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub method: AuthMethod,
    pub provider_id: String,
    /// Delete the pending signup code for `email` as part of the same transaction
    pub consume_signup_code: bool,
}

/// Account details returned to the owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDetails {
    pub email: String,
    pub display_name: String,
}

/// Signup code request (also used for resending)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub captcha_token: String,
}

/// Signup code check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySignupRequest {
    pub email: String,
    pub code: String,
    pub captcha_token: String,
}

/// Final signup step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub email: String,
    pub code: String,
    pub password: String,
    pub captcha_token: String,
}

/// Email and password login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub captcha_token: String,
}

/// OAuth authorization-code sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthLoginRequest {
    pub code: String,
}

/// Password reset request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
    pub captcha_token: String,
}

/// Password reset code check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetVerify {
    pub email: String,
    pub code: String,
    pub captcha_token: String,
}

/// Password reset confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub password: String,
    pub captcha_token: String,
}

/// Outcome of a signup code request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    /// A fresh code was generated and mailed
    CodeSent,
    /// A live code already exists; nothing was sent
    AlreadyPending,
}
