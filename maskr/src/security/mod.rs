//! Security primitives shared by the account flows.
//!
//! - [`CredentialHasher`]: Argon2id hashes for passwords and one-time codes
//! - [`is_valid_password`]: the account password policy
//! - [`RateLimiter`]: fixed-window admission control, per route or compound
//! - [`RevocationLedger`]: tombstones for refresh tokens revoked before expiry
//!
//! ## Rate Limiting
//!
//! Counters live in the shared [`KeyValueStore`](crate::kv::KeyValueStore) under
//! `ratelimit:{route}:{identity}`; compound mode adds a cross-route budget under
//! `ratelimit:{identity}:global`. With a limit of `n`, request `n + 1` of a window
//! is the first one rejected.
//!
//! ## Example
//!
//! ```no_run
//! use maskr::kv::MemoryKeyValueStore;
//! use maskr::security::{RateLimitConfig, RateLimitMode, RateLimiter, RevocationLedger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryKeyValueStore::new());
//!
//!     let limiter = RateLimiter::new(store.clone(), RateLimitMode::PerRoute);
//!     let result = limiter
//!         .check_and_record("signin_email", "203.0.113.7", &RateLimitConfig::sign_in())
//!         .await?;
//!     if result.is_allowed() {
//!         println!("{} attempts remaining", result.remaining().unwrap_or(0));
//!     }
//!
//!     let ledger = RevocationLedger::new(store);
//!     ledger.revoke("refresh.token.value", chrono::Utc::now().timestamp() + 60).await?;
//!     assert!(ledger.is_revoked("refresh.token.value").await?);
//!
//!     Ok(())
//! }
//! ```

pub mod credentials;
pub mod errors;
pub mod password;
pub mod rate_limiter;
pub mod revocation;

pub use credentials::CredentialHasher;
pub use errors::{
    CredentialError, CredentialResult, RateLimitError, RateLimiterResult, RevocationError,
    RevocationResult,
};
pub use password::is_valid_password;
pub use rate_limiter::{RateLimitConfig, RateLimitMode, RateLimitResult, RateLimiter};
pub use revocation::RevocationLedger;
