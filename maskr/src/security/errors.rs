//! Error types for security module

use crate::kv::KvError;
use thiserror::Error;

/// Result type for credential hashing
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Credential hashing errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Argon2 parameters rejected
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    /// Hashing itself failed
    #[error("Failed to hash secret: {0}")]
    Hashing(String),
}

/// Result type for rate limiting operations
pub type RateLimiterResult<T> = Result<T, RateLimitError>;

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Counter store unavailable
    #[error("Rate limit store error: {0}")]
    Store(#[from] KvError),
}

/// Result type for revocation ledger operations
pub type RevocationResult<T> = Result<T, RevocationError>;

/// Revocation ledger errors
#[derive(Debug, Error)]
pub enum RevocationError {
    /// Tombstone store unavailable
    #[error("Revocation store error: {0}")]
    Store(#[from] KvError),
}
