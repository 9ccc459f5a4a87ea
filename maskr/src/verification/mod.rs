//! One-time verification codes.
//!
//! Account signup, email ownership and password reset share one lifecycle:
//! requesting a code upserts a record keyed by email, email id or user id; the
//! record is consumed (deleted) by the first correct presentation before its
//! expiry. An expired record is rejected but left in place until the next request
//! replaces it. Codes are stored as Argon2id hashes only.

use crate::security::CredentialHasher;
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Digits in account signup codes
pub const ACCOUNT_CODE_LENGTH: usize = 5;

/// Digits in email ownership codes
pub const EMAIL_CODE_LENGTH: usize = 5;

/// Digits in password-reset codes
pub const RESET_CODE_LENGTH: usize = 6;

/// Lifetime of an account signup code
pub const ACCOUNT_CODE_TTL: Duration = Duration::minutes(5);

/// Lifetime of a re-requested email code
pub const EMAIL_CODE_TTL: Duration = Duration::minutes(5);

/// Lifetime of the code sent when an email is first added
pub const NEW_EMAIL_CODE_TTL: Duration = Duration::minutes(30);

/// Lifetime of a password-reset code
pub const RESET_CODE_TTL: Duration = Duration::minutes(5);

/// Verification lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// No pending record for the key
    #[error("No code has been requested")]
    NotFound,

    /// Code does not match the pending record
    #[error("Invalid code")]
    InvalidCode,

    /// Pending record is past its expiry
    #[error("Code has expired")]
    Expired,
}

/// A stored pending code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCode {
    pub code_hash: String,
    /// Unix seconds; the code is valid while `now <= expires_at`
    pub expires_at: i64,
}

impl PendingCode {
    /// Hash `code` and stamp it with an expiry `ttl` from now
    pub fn issue(
        code: &str,
        ttl: Duration,
        hasher: &CredentialHasher,
    ) -> crate::security::CredentialResult<Self> {
        Ok(Self {
            code_hash: hasher.hash(code)?,
            expires_at: (Utc::now() + ttl).timestamp(),
        })
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Generate a numeric code of `length` digits
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Check a presented code against the pending record
///
/// A wrong code is reported before expiry so that an expired record never
/// confirms a guess.
pub fn check(
    record: Option<&PendingCode>,
    code: &str,
    now: i64,
    hasher: &CredentialHasher,
) -> Result<(), VerificationError> {
    let record = record.ok_or(VerificationError::NotFound)?;

    if !hasher.verify(code, &record.code_hash) {
        return Err(VerificationError::InvalidCode);
    }

    if record.is_expired(now) {
        return Err(VerificationError::Expired);
    }

    Ok(())
}
