//! Token error types.

use super::TokenType;
use thiserror::Error;

/// Token validation and signing errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature is valid but `exp` has passed
    #[error("Token has expired")]
    Expired,

    /// A token of another family was presented
    #[error("Expected a {expected} token, got a {found} token")]
    TypeMismatch { expected: TokenType, found: TokenType },

    /// Bad signature, malformed token or unexpected claims
    #[error("Invalid token")]
    Invalid,

    /// Signing failed
    #[error("Token encoding failed: {0}")]
    Encoding(jsonwebtoken::errors::Error),
}

/// Result type for token operations
pub type TokenResult<T> = Result<T, TokenError>;
