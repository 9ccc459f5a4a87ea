//! Forwarding addresses owned by a user.
//!
//! A user's primary address is created with the account and is already verified.
//! Further addresses start unverified and must be confirmed with a mailed code
//! before masks can forward to them.

use crate::auth::UserId;
use crate::db::{EmailRepository, StoreError, VerificationRepository};
use crate::domains::DomainCache;
use crate::mailer::{Mailer, MailerError};
use crate::security::{CredentialError, CredentialHasher};
use crate::verification::{
    self, EMAIL_CODE_LENGTH, EMAIL_CODE_TTL, NEW_EMAIL_CODE_TTL, PendingCode, VerificationError,
};
use chrono::Utc;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

pub mod models;

pub use models::{AddEmailRequest, Email, VerifyEmailRequest};

/// Trim and lowercase an address for storage and comparison
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

static ADDRESS_SHAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Loose shape check: one `@`, no whitespace, a dot in the domain
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_SHAPE.as_ref().is_some_and(|re| re.is_match(address))
}

/// Domain part of an address, if it has exactly one `@`
pub fn domain_of(address: &str) -> Option<&str> {
    let (local, domain) = address.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(domain)
}

/// Email management errors
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Hashing error: {0}")]
    Hashing(#[from] CredentialError),

    #[error("Mail delivery failed: {0}")]
    Mailer(#[from] MailerError),

    #[error("{0}")]
    Verification(#[from] VerificationError),

    #[error("Invalid email")]
    InvalidEmail,

    /// Masks cannot forward to other masks
    #[error("You cannot use that email")]
    MaskDomain,

    #[error("That email is already registered to your account")]
    AlreadyRegistered,

    #[error("Could not find email")]
    NotFound,

    #[error("That email is already verified")]
    AlreadyVerified,

    #[error("There are still masks connected to that email. Delete those first.")]
    HasMasks,

    #[error("You cannot delete your primary email")]
    PrimaryEmail,
}

impl EmailError {
    /// Message safe to return to the client
    pub fn client_message(&self) -> String {
        match self {
            EmailError::Store(_) | EmailError::Hashing(_) => "Something went wrong".to_string(),
            EmailError::Mailer(_) => "Could not send verification email, try again later.".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for email management
pub type EmailResult<T> = Result<T, EmailError>;

/// Adds, verifies and removes a user's forwarding addresses
#[derive(Clone)]
pub struct EmailManager {
    emails: Arc<dyn EmailRepository>,
    verifications: Arc<dyn VerificationRepository>,
    domains: Arc<DomainCache>,
    hasher: CredentialHasher,
    mailer: Arc<dyn Mailer>,
}

impl EmailManager {
    pub fn new(
        emails: Arc<dyn EmailRepository>,
        verifications: Arc<dyn VerificationRepository>,
        domains: Arc<DomainCache>,
        hasher: CredentialHasher,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            emails,
            verifications,
            domains,
            hasher,
            mailer,
        }
    }

    /// Addresses of a user, primary first
    pub async fn list(&self, user_id: UserId) -> EmailResult<Vec<Email>> {
        Ok(self.emails.list_emails(user_id).await?)
    }

    /// Add an unverified address and mail its first code (valid for 30 minutes)
    pub async fn add(&self, user_id: UserId, address: &str) -> EmailResult<Email> {
        let address = normalize_address(address);
        if !is_valid_address(&address) {
            return Err(EmailError::InvalidEmail);
        }

        if let Some(domain) = domain_of(&address)
            && self.domains.get(domain).await.is_some()
        {
            return Err(EmailError::MaskDomain);
        }

        if self.emails.find_email(user_id, &address).await?.is_some() {
            return Err(EmailError::AlreadyRegistered);
        }

        let code = verification::generate_code(EMAIL_CODE_LENGTH);
        let pending = PendingCode::issue(&code, NEW_EMAIL_CODE_TTL, &self.hasher)?;

        let email = self
            .emails
            .create_email(user_id, &address, &pending)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation => EmailError::AlreadyRegistered,
                other => EmailError::Store(other),
            })?;

        self.mailer.send_verification(&address, &code).await?;
        log::info!("User {} added email {}", user_id, email.id);

        Ok(email)
    }

    /// Replace the pending code of an unverified address and mail it
    pub async fn request_code(&self, user_id: UserId, address: &str) -> EmailResult<()> {
        let email = self.find_unverified(user_id, address).await?;

        let code = verification::generate_code(EMAIL_CODE_LENGTH);
        let pending = PendingCode::issue(&code, EMAIL_CODE_TTL, &self.hasher)?;
        self.verifications.upsert_email_code(email.id, &pending).await?;

        self.mailer.send_verification(&email.email, &code).await?;
        Ok(())
    }

    /// Confirm ownership with the mailed code
    pub async fn verify(&self, user_id: UserId, address: &str, code: &str) -> EmailResult<()> {
        let email = self.find_unverified(user_id, address).await?;

        let record = self.verifications.find_email_code(email.id).await?;
        verification::check(record.as_ref(), code, Utc::now().timestamp(), &self.hasher)?;

        if !self.emails.mark_verified(email.id).await? {
            return Err(EmailError::NotFound);
        }
        log::info!("User {} verified email {}", user_id, email.id);

        Ok(())
    }

    /// Remove a non-primary address that no mask forwards to
    pub async fn delete(&self, user_id: UserId, address: &str) -> EmailResult<()> {
        let address = normalize_address(address);
        let email = self
            .emails
            .find_email(user_id, &address)
            .await?
            .ok_or(EmailError::NotFound)?;

        if email.is_primary {
            return Err(EmailError::PrimaryEmail);
        }

        match self.emails.delete_email(email.id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(EmailError::NotFound),
            Err(StoreError::ForeignKeyViolation) => Err(EmailError::HasMasks),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_unverified(&self, user_id: UserId, address: &str) -> EmailResult<Email> {
        let address = normalize_address(address);
        let email = self
            .emails
            .find_email(user_id, &address)
            .await?
            .ok_or(EmailError::NotFound)?;

        if email.is_verified {
            return Err(EmailError::AlreadyVerified);
        }
        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthMethod, NewAccount};
    use crate::db::{AccountRepository, MemoryStore};
    use crate::mailer::{MailKind, RecordingMailer};
    use uuid::Uuid;

    const OWNER: &str = "owner@example.com";
    const SECOND: &str = "second@example.com";

    struct Fixture {
        manager: EmailManager,
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        hasher: CredentialHasher,
        user_id: UserId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let hasher = CredentialHasher::with_params(1024, 1, 1).unwrap();

        let user_id = Uuid::new_v4();
        store
            .create_account(&NewAccount {
                user_id,
                email: OWNER.to_string(),
                display_name: String::new(),
                password_hash: Some("hash".to_string()),
                method: AuthMethod::Email,
                provider_id: Uuid::new_v4().to_string(),
                consume_signup_code: false,
            })
            .await
            .unwrap();

        let manager = EmailManager::new(
            store.clone(),
            store.clone(),
            Arc::new(DomainCache::new(store.clone())),
            hasher.clone(),
            mailer.clone(),
        );

        Fixture {
            manager,
            store,
            mailer,
            hasher,
            user_id,
        }
    }

    async fn last_code(mailer: &RecordingMailer, to: &str) -> String {
        mailer
            .last_code(MailKind::EmailVerification, to)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_code_replaces_pending_code() {
        let f = fixture().await;
        f.manager.add(f.user_id, SECOND).await.unwrap();
        let old = last_code(&f.mailer, SECOND).await;

        let mut new = old.clone();
        while new == old {
            f.manager.request_code(f.user_id, SECOND).await.unwrap();
            new = last_code(&f.mailer, SECOND).await;
        }

        let err = f.manager.verify(f.user_id, SECOND, &old).await.unwrap_err();
        assert!(matches!(
            err,
            EmailError::Verification(VerificationError::InvalidCode)
        ));

        f.manager.verify(f.user_id, SECOND, &new).await.unwrap();
        let emails = f.manager.list(f.user_id).await.unwrap();
        assert!(emails.iter().any(|e| e.email == SECOND && e.is_verified));
    }

    #[tokio::test]
    async fn test_request_code_for_verified_address() {
        let f = fixture().await;

        let err = f.manager.request_code(f.user_id, OWNER).await.unwrap_err();
        assert!(matches!(err, EmailError::AlreadyVerified));
        assert!(f.mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() {
        let f = fixture().await;
        let email = f.manager.add(f.user_id, SECOND).await.unwrap();

        let expired = PendingCode {
            code_hash: f.hasher.hash("12345").unwrap(),
            expires_at: Utc::now().timestamp() - 60,
        };
        f.store.upsert_email_code(email.id, &expired).await.unwrap();

        let err = f.manager.verify(f.user_id, SECOND, "12345").await.unwrap_err();
        assert!(matches!(
            err,
            EmailError::Verification(VerificationError::Expired)
        ));

        let emails = f.manager.list(f.user_id).await.unwrap();
        assert!(emails.iter().any(|e| e.email == SECOND && !e.is_verified));
    }

    #[tokio::test]
    async fn test_primary_email_cannot_be_deleted() {
        let f = fixture().await;

        let err = f.manager.delete(f.user_id, "Owner@Example.com").await.unwrap_err();
        assert!(matches!(err, EmailError::PrimaryEmail));

        f.manager.add(f.user_id, SECOND).await.unwrap();
        f.manager.delete(f.user_id, SECOND).await.unwrap();
        assert_eq!(f.manager.list(f.user_id).await.unwrap().len(), 1);
    }

    #[test]
    fn test_address_shape() {
        assert!(is_valid_address("alice@example.com"));
        assert!(is_valid_address("a.b+tag@sub.example.co"));
        assert!(!is_valid_address("alice"));
        assert!(!is_valid_address("alice@example"));
        assert!(!is_valid_address("al ice@example.com"));
        assert!(!is_valid_address("a@b@example.com"));
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("a@relay.example.com"), Some("relay.example.com"));
        assert_eq!(domain_of("a@b@c"), None);
        assert_eq!(domain_of("@example.com"), None);
        assert_eq!(domain_of("nodomain"), None);
    }

    #[test]
    fn test_client_message_hides_internals() {
        let err = EmailError::Store(StoreError::NotFound);
        assert_eq!(err.client_message(), "Something went wrong");
        assert_eq!(
            EmailError::HasMasks.client_message(),
            "There are still masks connected to that email. Delete those first."
        );
    }
}
