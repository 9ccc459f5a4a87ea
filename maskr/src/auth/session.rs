//! Session lifecycle: refresh, revoke, authenticate.

use super::{
    errors::{AuthError, AuthResult},
    models::UserId,
};
use crate::db::UserRepository;
use crate::security::RevocationLedger;
use crate::token::{Claims, Token, TokenService, TokenType};
use std::sync::Arc;

/// Manages tokens after sign-in
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
    ledger: RevocationLedger,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: TokenService,
        ledger: RevocationLedger,
    ) -> Self {
        Self {
            users,
            tokens,
            ledger,
        }
    }

    /// Mint a new access token from a refresh token
    ///
    /// The refresh token must be unrevoked and carry the user's live
    /// `token_version`. A ledger that cannot be reached rejects the refresh.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<Token> {
        let claims = self.tokens.validate(refresh_token, TokenType::Refresh)?;

        if self.ledger.is_revoked(refresh_token).await? {
            log::warn!("Revoked refresh token presented for user {}", claims.id);
            return Err(AuthError::TokenRevoked);
        }

        let user = self
            .users
            .find_by_id(claims.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.token_version != claims.version {
            return Err(AuthError::TokenVersionMismatch);
        }

        Ok(self
            .tokens
            .issue_access_token(user.id, user.token_version, claims.auth_method)?)
    }

    /// Revoke a refresh token until its natural expiry
    ///
    /// Returns `false` when the token was already past expiry.
    pub async fn revoke(&self, refresh_token: &str) -> AuthResult<bool> {
        let claims = self.tokens.validate(refresh_token, TokenType::Refresh)?;
        let revoked = self.ledger.revoke(refresh_token, claims.exp).await?;
        if revoked {
            log::info!("Refresh token revoked for user {}", claims.id);
        }
        Ok(revoked)
    }

    /// Validate an access token
    pub fn authenticate(&self, access_token: &str) -> AuthResult<Claims> {
        Ok(self.tokens.validate(access_token, TokenType::Access)?)
    }

    /// User id carried by a valid access token
    pub fn user_id(&self, access_token: &str) -> AuthResult<UserId> {
        self.authenticate(access_token).map(|claims| claims.id)
    }
}
