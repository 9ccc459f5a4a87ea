//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult},
    models::{
        AccountDetails, AuthMethod, CreateAccountRequest, LoginRequest, NewAccount,
        OAuthLoginRequest, PasswordResetConfirm, PasswordResetRequest, PasswordResetVerify,
        SignupOutcome, SignupRequest, User, UserId, VerifySignupRequest,
    },
};
use crate::captcha::{CaptchaVerifier, actions};
use crate::db::{AccountRepository, StoreError, UserRepository, VerificationRepository};
use crate::emails::{is_valid_address, normalize_address};
use crate::mailer::Mailer;
use crate::oauth::OAuthProvider;
use crate::security::{CredentialHasher, is_valid_password};
use crate::token::{TokenPair, TokenService};
use crate::verification::{
    self, ACCOUNT_CODE_LENGTH, ACCOUNT_CODE_TTL, PendingCode, RESET_CODE_LENGTH, RESET_CODE_TTL,
    VerificationError,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Authentication manager
///
/// Runs every flow that happens before the caller holds a session.
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    accounts: Arc<dyn AccountRepository>,
    verifications: Arc<dyn VerificationRepository>,
    tokens: TokenService,
    hasher: CredentialHasher,
    mailer: Arc<dyn Mailer>,
    captcha: Arc<dyn CaptchaVerifier>,
    oauth: Option<Arc<dyn OAuthProvider>>,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `users` - User and provider lookups
    /// * `accounts` - Account creation and password updates
    /// * `verifications` - Pending signup and reset codes
    /// * `tokens` - Token issuance
    /// * `hasher` - Password and code hashing
    /// * `mailer` - Code delivery
    /// * `captcha` - CAPTCHA checks on every public form
    pub fn new(
        users: Arc<dyn UserRepository>,
        accounts: Arc<dyn AccountRepository>,
        verifications: Arc<dyn VerificationRepository>,
        tokens: TokenService,
        hasher: CredentialHasher,
        mailer: Arc<dyn Mailer>,
        captcha: Arc<dyn CaptchaVerifier>,
    ) -> Self {
        Self {
            users,
            accounts,
            verifications,
            tokens,
            hasher,
            mailer,
            captcha,
            oauth: None,
        }
    }

    /// Enable OAuth sign-in through `provider`
    pub fn with_oauth(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.oauth = Some(provider);
        self
    }

    /// Start a signup by mailing a code to `email`
    ///
    /// A still-valid pending code is not replaced and no mail is sent.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidEmail` - malformed address
    /// * `AuthError::CaptchaFailed` - CAPTCHA rejected
    /// * `AuthError::EmailInUse` - an email account already uses the address
    pub async fn request_signup(&self, request: &SignupRequest) -> AuthResult<SignupOutcome> {
        let email = self.valid_email(&request.email)?;
        self.require_captcha(&request.captcha_token, actions::CREATE_ACCOUNT_CODE)
            .await?;
        self.ensure_email_free(&email).await?;

        let now = Utc::now().timestamp();
        if let Some(pending) = self.verifications.find_account_code(&email).await?
            && !pending.is_expired(now)
        {
            return Ok(SignupOutcome::AlreadyPending);
        }

        self.send_signup_code(&email).await?;
        Ok(SignupOutcome::CodeSent)
    }

    /// Replace a pending signup code and mail the new one
    pub async fn resend_signup_code(&self, request: &SignupRequest) -> AuthResult<()> {
        let email = self.valid_email(&request.email)?;
        self.require_captcha(&request.captcha_token, actions::RESEND_ACCOUNT_CODE)
            .await?;

        if self.verifications.find_account_code(&email).await?.is_none() {
            return Err(VerificationError::NotFound.into());
        }
        self.ensure_email_free(&email).await?;

        self.send_signup_code(&email).await
    }

    /// Check a signup code without consuming it
    pub async fn verify_signup_code(&self, request: &VerifySignupRequest) -> AuthResult<()> {
        let email = self.valid_email(&request.email)?;
        self.require_captcha(&request.captcha_token, actions::VERIFY_ACCOUNT_CODE)
            .await?;

        let pending = self.verifications.find_account_code(&email).await?;
        verification::check(
            pending.as_ref(),
            &request.code,
            Utc::now().timestamp(),
            &self.hasher,
        )?;
        Ok(())
    }

    /// Finish a signup: consume the code and create the account
    ///
    /// User, email provider and primary verified email are created together with
    /// the deletion of the code; a concurrent request presenting the same code
    /// loses with `VerificationError::NotFound`.
    pub async fn create_account(&self, request: &CreateAccountRequest) -> AuthResult<TokenPair> {
        if !is_valid_password(&request.password) {
            return Err(AuthError::WeakPassword);
        }
        self.require_captcha(&request.captcha_token, actions::CREATE_ACCOUNT)
            .await?;
        let email = self.valid_email(&request.email)?;

        let pending = self.verifications.find_account_code(&email).await?;
        verification::check(
            pending.as_ref(),
            &request.code,
            Utc::now().timestamp(),
            &self.hasher,
        )?;
        self.ensure_email_free(&email).await?;

        let account = NewAccount {
            user_id: Uuid::new_v4(),
            email,
            display_name: String::new(),
            password_hash: Some(self.hasher.hash(&request.password)?),
            method: AuthMethod::Email,
            provider_id: Uuid::new_v4().to_string(),
            consume_signup_code: true,
        };

        let user = self
            .accounts
            .create_account(&account)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::Verification(VerificationError::NotFound),
                other => AuthError::Store(other),
            })?;
        log::info!("Created account {} ({})", user.id, AuthMethod::Email.as_str());

        Ok(self
            .tokens
            .issue_pair(user.id, user.token_version, AuthMethod::Email)?)
    }

    /// Email and password sign-in
    ///
    /// # Errors
    ///
    /// * `AuthError::IncorrectLogin` - unknown email, OAuth-only account or wrong password
    pub async fn sign_in_with_email(&self, request: &LoginRequest) -> AuthResult<TokenPair> {
        self.require_captcha(&request.captcha_token, actions::EMAIL_LOGIN)
            .await?;

        let email = normalize_address(&request.email);
        let user = self
            .users
            .find_by_login_email(&email)
            .await?
            .ok_or(AuthError::IncorrectLogin)?;

        let matches = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| self.hasher.verify(&request.password, hash));
        if !matches {
            return Err(AuthError::IncorrectLogin);
        }

        Ok(self
            .tokens
            .issue_pair(user.id, user.token_version, AuthMethod::Email)?)
    }

    /// OAuth sign-in, creating the account on first use
    pub async fn sign_in_with_oauth(&self, request: &OAuthLoginRequest) -> AuthResult<TokenPair> {
        let provider = self.oauth.as_ref().ok_or(AuthError::OAuthDisabled)?;
        let method = provider.method();
        let profile = provider.exchange(&request.code).await?;

        let user = match self
            .users
            .find_provider(method, &profile.external_id)
            .await?
        {
            Some(binding) => self
                .users
                .find_by_id(binding.user_id)
                .await?
                .ok_or(AuthError::UserNotFound)?,
            None => {
                if !profile.verified_email {
                    return Err(AuthError::UnverifiedProviderEmail);
                }

                let account = NewAccount {
                    user_id: Uuid::new_v4(),
                    email: normalize_address(&profile.email),
                    display_name: profile.name.clone(),
                    password_hash: None,
                    method,
                    provider_id: profile.external_id.clone(),
                    consume_signup_code: false,
                };
                let user = self.accounts.create_account(&account).await?;
                log::info!("Created account {} ({})", user.id, method.as_str());
                user
            }
        };

        Ok(self.tokens.issue_pair(user.id, user.token_version, method)?)
    }

    /// Mail a 6-digit password-reset code
    pub async fn request_password_reset(&self, request: &PasswordResetRequest) -> AuthResult<()> {
        self.require_captcha(&request.captcha_token, actions::RESET_PASSWORD)
            .await?;
        let user = self.login_user(&request.email).await?;

        let code = verification::generate_code(RESET_CODE_LENGTH);
        let pending = PendingCode::issue(&code, RESET_CODE_TTL, &self.hasher)?;
        self.verifications.upsert_reset_code(user.id, &pending).await?;

        self.mailer.send_password_code(&user.email, &code).await?;
        Ok(())
    }

    /// Exchange a reset code for a single-purpose reset token
    ///
    /// The code is consumed before the token is issued, so it can only ever
    /// produce one token.
    pub async fn verify_password_reset(&self, request: &PasswordResetVerify) -> AuthResult<String> {
        self.require_captcha(&request.captcha_token, actions::VERIFY_PASSWORD)
            .await?;
        if request.code.len() != RESET_CODE_LENGTH {
            return Err(VerificationError::InvalidCode.into());
        }
        let user = self.login_user(&request.email).await?;

        let pending = self.verifications.find_reset_code(user.id).await?;
        verification::check(
            pending.as_ref(),
            &request.code,
            Utc::now().timestamp(),
            &self.hasher,
        )?;

        if !self.verifications.delete_reset_code(user.id).await? {
            return Err(VerificationError::NotFound.into());
        }

        Ok(self
            .tokens
            .issue_password_reset_token(user.id, user.token_version)?)
    }

    /// Set a new password with a reset token
    ///
    /// The password change bumps `token_version`, invalidating every session and
    /// reset token issued before it.
    pub async fn confirm_password_reset(&self, request: &PasswordResetConfirm) -> AuthResult<()> {
        if !is_valid_password(&request.password) {
            return Err(AuthError::WeakPassword);
        }
        self.require_captcha(&request.captcha_token, actions::CONFIRM_PASSWORD)
            .await?;

        let claims = self.tokens.validate_password_reset_token(&request.token)?;
        let user = self
            .users
            .find_by_id(claims.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.token_version != claims.version {
            log::warn!("Stale reset token presented for user {}", user.id);
            return Err(AuthError::TokenVersionMismatch);
        }

        if user
            .password_hash
            .as_deref()
            .is_some_and(|hash| self.hasher.verify(&request.password, hash))
        {
            return Err(AuthError::PasswordReused);
        }

        let hash = self.hasher.hash(&request.password)?;
        if !self
            .accounts
            .update_password(user.id, &hash, claims.version)
            .await?
        {
            return Err(AuthError::TokenVersionMismatch);
        }
        log::info!("Password reset for user {}", user.id);

        Ok(())
    }

    /// Email and display name of a user
    pub async fn account_details(&self, user_id: UserId) -> AuthResult<AccountDetails> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(AccountDetails {
            email: user.email,
            display_name: user.display_name,
        })
    }

    fn valid_email(&self, email: &str) -> AuthResult<String> {
        let email = normalize_address(email);
        if !is_valid_address(&email) {
            return Err(AuthError::InvalidEmail);
        }
        Ok(email)
    }

    async fn require_captcha(&self, token: &str, action: &str) -> AuthResult<()> {
        if !self.captcha.validate(token, action).await? {
            return Err(AuthError::CaptchaFailed);
        }
        Ok(())
    }

    async fn ensure_email_free(&self, email: &str) -> AuthResult<()> {
        if self.users.find_by_login_email(email).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }
        Ok(())
    }

    async fn login_user(&self, email: &str) -> AuthResult<User> {
        self.users
            .find_by_login_email(&normalize_address(email))
            .await?
            .ok_or(AuthError::NoAccount)
    }

    async fn send_signup_code(&self, email: &str) -> AuthResult<()> {
        let code = verification::generate_code(ACCOUNT_CODE_LENGTH);
        let pending = PendingCode::issue(&code, ACCOUNT_CODE_TTL, &self.hasher)?;
        self.verifications.upsert_account_code(email, &pending).await?;

        self.mailer.send_code(email, &code).await?;
        Ok(())
    }
}
