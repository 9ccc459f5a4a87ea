//! JWT token service.
//!
//! Two token families share a single HS256 secret:
//! - access tokens (5 minutes by default) authorize user-scoped routes
//! - refresh tokens (24 hours by default) mint new access tokens
//!
//! A third, single-purpose password-reset token is only redeemable when changing
//! a password. Every token embeds the user's `token_version` at issuance; callers
//! compare it against the live user row, which is the global revocation switch.
//! Individual refresh tokens are revoked through
//! [`RevocationLedger`](crate::security::RevocationLedger), not here.

pub mod claims;
pub mod errors;
pub mod service;

pub use claims::{Claims, ResetClaims, Token, TokenPair, TokenType};
pub use errors::{TokenError, TokenResult};
pub use service::{TokenService, TokenSettings};
