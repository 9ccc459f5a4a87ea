//! Repository trait definitions for testability and dependency injection.
//!
//! Each flow manager depends only on the traits it needs. [`PgStore`](super::PgStore)
//! implements all of them over PostgreSQL and [`MemoryStore`](super::MemoryStore)
//! in memory.

use async_trait::async_trait;

use super::StoreResult;
use crate::auth::{AuthMethod, NewAccount, Provider, User, UserId};
use crate::domains::Domain;
use crate::emails::Email;
use crate::masks::{MaskSummary, MaskTarget, NewMask};
use crate::verification::PendingCode;

/// Read access to users and their providers
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by ID
    async fn find_by_id(&self, user_id: UserId) -> StoreResult<Option<User>>;

    /// Find the user that signs in with `email` through the email provider
    async fn find_by_login_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Find a provider binding by method and provider-scoped id
    async fn find_provider(
        &self,
        method: AuthMethod,
        provider_id: &str,
    ) -> StoreResult<Option<Provider>>;
}

/// Account mutations that span several tables
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert user, provider and primary verified email in one transaction
    ///
    /// With `consume_signup_code` set, the pending signup code for the email is
    /// deleted in the same transaction; if it is already gone the whole account
    /// creation fails with `StoreError::NotFound`.
    async fn create_account(&self, account: &NewAccount) -> StoreResult<User>;

    /// Replace the password hash and bump `token_version`
    ///
    /// Only applies while the stored version still equals `expected_version`;
    /// returns whether a row was updated.
    async fn update_password(
        &self,
        user_id: UserId,
        password_hash: &str,
        expected_version: i32,
    ) -> StoreResult<bool>;
}

/// Pending verification codes for all three flows
#[async_trait]
pub trait VerificationRepository: Send + Sync {
    async fn find_account_code(&self, email: &str) -> StoreResult<Option<PendingCode>>;

    /// Insert or replace the signup code for `email`
    async fn upsert_account_code(&self, email: &str, code: &PendingCode) -> StoreResult<()>;

    async fn find_email_code(&self, email_id: i64) -> StoreResult<Option<PendingCode>>;

    /// Insert or replace the ownership code for an email
    async fn upsert_email_code(&self, email_id: i64, code: &PendingCode) -> StoreResult<()>;

    async fn find_reset_code(&self, user_id: UserId) -> StoreResult<Option<PendingCode>>;

    /// Insert or replace the password-reset code for a user
    async fn upsert_reset_code(&self, user_id: UserId, code: &PendingCode) -> StoreResult<()>;

    /// Consume the password-reset code; returns whether one existed
    async fn delete_reset_code(&self, user_id: UserId) -> StoreResult<bool>;
}

/// Email addresses owned by users
#[async_trait]
pub trait EmailRepository: Send + Sync {
    async fn list_emails(&self, user_id: UserId) -> StoreResult<Vec<Email>>;

    async fn find_email(&self, user_id: UserId, address: &str) -> StoreResult<Option<Email>>;

    /// Insert an unverified email together with its first ownership code
    ///
    /// Fails with `StoreError::UniqueViolation` if the user already has it.
    async fn create_email(
        &self,
        user_id: UserId,
        address: &str,
        code: &PendingCode,
    ) -> StoreResult<Email>;

    /// Mark verified and delete the pending code in one transaction
    async fn mark_verified(&self, email_id: i64) -> StoreResult<bool>;

    /// Delete an email
    ///
    /// Fails with `StoreError::ForeignKeyViolation` while masks forward to it.
    async fn delete_email(&self, email_id: i64) -> StoreResult<bool>;
}

/// Masks and their counters
#[async_trait]
pub trait MaskRepository: Send + Sync {
    /// Masks of a user, newest first
    async fn list_masks(&self, user_id: UserId) -> StoreResult<Vec<MaskSummary>>;

    async fn mask_exists(&self, mask: &str) -> StoreResult<bool>;

    /// Fails with `StoreError::UniqueViolation` if the address is taken
    async fn create_mask(&self, mask: &NewMask) -> StoreResult<()>;

    async fn delete_mask(&self, user_id: UserId, mask: &str) -> StoreResult<bool>;

    async fn set_mask_enabled(&self, user_id: UserId, mask: &str, enabled: bool)
    -> StoreResult<bool>;

    async fn find_mask_target(&self, mask: &str) -> StoreResult<Option<MaskTarget>>;

    async fn increment_received(&self, mask: &str) -> StoreResult<bool>;

    /// Increment both the received and forwarded counters
    async fn increment_forwarded(&self, mask: &str) -> StoreResult<bool>;
}

/// The domain allow-list
#[async_trait]
pub trait DomainRepository: Send + Sync {
    async fn list_domains(&self) -> StoreResult<Vec<Domain>>;
}

/// Store liveness check
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}
