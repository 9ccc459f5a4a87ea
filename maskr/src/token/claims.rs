//! Token claim and wire types.

use crate::auth::{AuthMethod, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token family, carried in the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    PasswordReset,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::PasswordReset => "password_reset",
        };
        f.write_str(name)
    }
}

/// Claims of access and refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: UserId,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub version: i32,
    pub auth_method: AuthMethod,
    pub exp: i64,
    /// Set on refresh tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

/// Claims of password-reset tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    pub id: UserId,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub version: i32,
    pub exp: i64,
    pub sub: String,
}

/// A signed token with its absolute expiry (unix seconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    pub expires_at: i64,
    pub auth_method: AuthMethod,
}

/// Access and refresh token issued together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: Token,
    pub refresh_token: Token,
}
