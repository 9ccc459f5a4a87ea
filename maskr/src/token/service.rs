//! Token issuance and validation.

use super::{
    claims::{Claims, ResetClaims, Token, TokenPair, TokenType},
    errors::{TokenError, TokenResult},
};
use crate::auth::{AuthMethod, UserId};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Lifetimes of the three token families
#[derive(Debug, Clone, Copy)]
pub struct TokenSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_ttl: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(5),
            refresh_ttl: Duration::hours(24),
            reset_ttl: Duration::minutes(5),
        }
    }
}

/// Mints and validates HS256 tokens with a single shared secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    settings: TokenSettings,
}

impl TokenService {
    /// Create a new token service
    ///
    /// # Arguments
    ///
    /// * `secret` - HMAC signing secret
    /// * `settings` - Token lifetimes
    pub fn new(secret: &str, settings: TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp == now` is still valid, `exp == now - 1` is not
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            settings,
        }
    }

    /// Token lifetimes in use
    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Issue an access token
    pub fn issue_access_token(
        &self,
        user_id: UserId,
        token_version: i32,
        auth_method: AuthMethod,
    ) -> TokenResult<Token> {
        let exp = (Utc::now() + self.settings.access_ttl).timestamp();
        let claims = Claims {
            id: user_id,
            token_type: TokenType::Access,
            version: token_version,
            auth_method,
            exp,
            sub: None,
        };

        Ok(Token {
            token: self.sign(&claims)?,
            expires_at: exp,
            auth_method,
        })
    }

    /// Issue a refresh token (`sub` carries the user id)
    pub fn issue_refresh_token(
        &self,
        user_id: UserId,
        token_version: i32,
        auth_method: AuthMethod,
    ) -> TokenResult<Token> {
        let exp = (Utc::now() + self.settings.refresh_ttl).timestamp();
        let claims = Claims {
            id: user_id,
            token_type: TokenType::Refresh,
            version: token_version,
            auth_method,
            exp,
            sub: Some(user_id.to_string()),
        };

        Ok(Token {
            token: self.sign(&claims)?,
            expires_at: exp,
            auth_method,
        })
    }

    /// Issue an access and refresh token sharing the same version snapshot
    pub fn issue_pair(
        &self,
        user_id: UserId,
        token_version: i32,
        auth_method: AuthMethod,
    ) -> TokenResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id, token_version, auth_method)?,
            refresh_token: self.issue_refresh_token(user_id, token_version, auth_method)?,
        })
    }

    /// Verify signature and expiry, then require `expected` as the token family
    ///
    /// Neither the revocation ledger nor the user's live `token_version` is consulted.
    ///
    /// # Errors
    ///
    /// * `TokenError::Expired` - `exp` is in the past
    /// * `TokenError::TypeMismatch` - token belongs to another family
    /// * `TokenError::Invalid` - signature or claims are invalid
    pub fn validate(&self, token: &str, expected: TokenType) -> TokenResult<Claims> {
        self.decode_as(token, expected)
    }

    /// Issue a password-reset token
    pub fn issue_password_reset_token(
        &self,
        user_id: UserId,
        token_version: i32,
    ) -> TokenResult<String> {
        let claims = ResetClaims {
            id: user_id,
            token_type: TokenType::PasswordReset,
            version: token_version,
            exp: (Utc::now() + self.settings.reset_ttl).timestamp(),
            sub: user_id.to_string(),
        };
        self.sign(&claims)
    }

    /// Validate a password-reset token
    pub fn validate_password_reset_token(&self, token: &str) -> TokenResult<ResetClaims> {
        self.decode_as(token, TokenType::PasswordReset)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> TokenResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    fn decode_as<T: DeserializeOwned>(&self, token: &str, expected: TokenType) -> TokenResult<T> {
        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        let found = data
            .claims
            .get("type")
            .cloned()
            .and_then(|v| serde_json::from_value::<TokenType>(v).ok())
            .ok_or(TokenError::Invalid)?;

        if found != expected {
            return Err(TokenError::TypeMismatch { expected, found });
        }

        serde_json::from_value(Value::Object(data.claims)).map_err(|_| TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const SECRET: &str = "test_secret_key_that_is_long_enough_for_hs256";

    fn service() -> TokenService {
        TokenService::new(SECRET, TokenSettings::default())
    }

    #[test]
    fn test_access_token_round_trip() {
        let tokens = service();
        let user_id = Uuid::new_v4();

        let token = tokens
            .issue_access_token(user_id, 7, AuthMethod::Email)
            .unwrap();
        let claims = tokens.validate(&token.token, TokenType::Access).unwrap();

        assert_eq!(claims.id, user_id);
        assert_eq!(claims.version, 7);
        assert_eq!(claims.auth_method, AuthMethod::Email);
        assert_eq!(claims.exp, token.expires_at);
        assert!(claims.sub.is_none());
    }

    #[test]
    fn test_refresh_token_carries_subject() {
        let tokens = service();
        let user_id = Uuid::new_v4();

        let token = tokens
            .issue_refresh_token(user_id, 1, AuthMethod::Google)
            .unwrap();
        let claims = tokens.validate(&token.token, TokenType::Refresh).unwrap();

        assert_eq!(claims.sub, Some(user_id.to_string()));
        assert_eq!(claims.auth_method, AuthMethod::Google);
    }

    #[test]
    fn test_pair_shares_version_snapshot() {
        let tokens = service();
        let pair = tokens.issue_pair(Uuid::new_v4(), 4, AuthMethod::Email).unwrap();

        let access = tokens.validate(&pair.access_token.token, TokenType::Access).unwrap();
        let refresh = tokens.validate(&pair.refresh_token.token, TokenType::Refresh).unwrap();

        assert_eq!(access.version, 4);
        assert_eq!(refresh.version, 4);
        assert!(pair.refresh_token.expires_at > pair.access_token.expires_at);
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let tokens = service();
        let token = tokens
            .issue_access_token(Uuid::new_v4(), 1, AuthMethod::Email)
            .unwrap();

        let err = tokens.validate(&token.token, TokenType::Refresh).unwrap_err();
        assert!(matches!(
            err,
            TokenError::TypeMismatch {
                expected: TokenType::Refresh,
                found: TokenType::Access
            }
        ));
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let tokens = service();
        let token = tokens
            .issue_refresh_token(Uuid::new_v4(), 1, AuthMethod::Email)
            .unwrap();

        let err = tokens.validate(&token.token, TokenType::Access).unwrap_err();
        assert!(matches!(err, TokenError::TypeMismatch { .. }));
    }

    #[test]
    fn test_expired_one_second_ago_fails() {
        let tokens = TokenService::new(
            SECRET,
            TokenSettings {
                access_ttl: Duration::seconds(-1),
                ..TokenSettings::default()
            },
        );
        let token = tokens
            .issue_access_token(Uuid::new_v4(), 1, AuthMethod::Email)
            .unwrap();

        let err = tokens.validate(&token.token, TokenType::Access).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = service()
            .issue_access_token(Uuid::new_v4(), 1, AuthMethod::Email)
            .unwrap();
        let other = TokenService::new("another_secret_key_that_is_also_long", TokenSettings::default());

        let err = other.validate(&token.token, TokenType::Access).unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let err = service().validate("not.a.jwt", TokenType::Access).unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }

    #[test]
    fn test_reset_token_round_trip() {
        let tokens = service();
        let user_id = Uuid::new_v4();

        let token = tokens.issue_password_reset_token(user_id, 2).unwrap();
        let claims = tokens.validate_password_reset_token(&token).unwrap();

        assert_eq!(claims.id, user_id);
        assert_eq!(claims.version, 2);
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn test_reset_token_is_single_purpose() {
        let tokens = service();
        let user_id = Uuid::new_v4();

        let reset = tokens.issue_password_reset_token(user_id, 1).unwrap();
        assert!(matches!(
            tokens.validate(&reset, TokenType::Access),
            Err(TokenError::TypeMismatch { .. })
        ));

        let access = tokens
            .issue_access_token(user_id, 1, AuthMethod::Email)
            .unwrap();
        assert!(matches!(
            tokens.validate_password_reset_token(&access.token),
            Err(TokenError::TypeMismatch { .. })
        ));
    }
}
