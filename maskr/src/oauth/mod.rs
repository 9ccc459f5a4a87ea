//! OAuth sign-in providers.

use crate::auth::AuthMethod;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// OAuth provider errors
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("OAuth transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The authorization code was not accepted
    #[error("Token exchange failed with status {0}")]
    Exchange(u16),

    #[error("Profile request failed with status {0}")]
    Profile(u16),
}

/// Result type for OAuth operations
pub type OAuthResult<T> = Result<T, OAuthError>;

/// Identity returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthProfile {
    /// Provider subject id
    #[serde(rename = "id")]
    pub external_id: String,
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    #[serde(default)]
    pub name: String,
}

/// Turns an authorization code into a verified identity
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Which provider row identities are stored under
    fn method(&self) -> AuthMethod;

    async fn exchange(&self, code: &str) -> OAuthResult<OAuthProfile>;
}

/// Google OAuth client settings
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google authorization-code flow
#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> OAuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn method(&self) -> AuthMethod {
        AuthMethod::Google
    }

    async fn exchange(&self, code: &str) -> OAuthResult<OAuthProfile> {
        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Exchange(response.status().as_u16()));
        }
        let token: TokenResponse = response.json().await?;

        let response = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Profile(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_userinfo_payload() {
        let profile: OAuthProfile = serde_json::from_str(
            r#"{"id":"1098","email":"a@example.com","verified_email":true,"name":"Alice","picture":"x"}"#,
        )
        .unwrap();

        assert_eq!(profile.external_id, "1098");
        assert!(profile.verified_email);
        assert_eq!(profile.name, "Alice");
    }

    #[test]
    fn test_missing_verified_flag_means_unverified() {
        let profile: OAuthProfile =
            serde_json::from_str(r#"{"id":"1","email":"a@example.com"}"#).unwrap();
        assert!(!profile.verified_email);
    }
}
