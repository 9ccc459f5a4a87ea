//! Mask management.
//!
//! A mask is an address on an allow-listed domain that forwards to one of the
//! owner's verified emails. Mask addresses are globally unique and stored
//! lowercase.

use crate::auth::UserId;
use crate::db::{EmailRepository, MaskRepository, StoreError};
use crate::domains::DomainCache;
use crate::emails::normalize_address;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

pub mod lookup;
pub mod models;

pub use lookup::{LookupError, LookupResult, MaskLookup};
pub use models::{AddMaskRequest, MaskStatusRequest, MaskSummary, MaskTarget, NewMask};

static MASK_SHAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$").ok());

/// Whether `mask` is a well-formed lowercase address
pub fn is_valid_mask(mask: &str) -> bool {
    MASK_SHAPE.as_ref().is_some_and(|re| re.is_match(mask))
}

/// Mask management errors
#[derive(Debug, Error)]
pub enum MaskError {
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid masked email address")]
    InvalidAddress,

    #[error("Domain not found")]
    DomainNotFound,

    #[error("That mask already exists")]
    AlreadyExists,

    /// The forward-to address is not one of the caller's emails
    #[error("You don't own that email")]
    EmailNotOwned,

    #[error("Email is not verified")]
    EmailNotVerified,

    #[error("Please provide a valid mask value")]
    MissingMask,

    /// Unknown mask or owned by someone else
    #[error("You don't own that mask")]
    MaskNotOwned,
}

impl MaskError {
    /// Message safe to return to the client
    pub fn client_message(&self) -> String {
        match self {
            MaskError::Store(_) => "Something went wrong".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for mask management
pub type MaskResult<T> = Result<T, MaskError>;

/// Creates, lists and toggles a user's masks
#[derive(Clone)]
pub struct MaskManager {
    masks: Arc<dyn MaskRepository>,
    emails: Arc<dyn EmailRepository>,
    domains: Arc<DomainCache>,
}

impl MaskManager {
    pub fn new(
        masks: Arc<dyn MaskRepository>,
        emails: Arc<dyn EmailRepository>,
        domains: Arc<DomainCache>,
    ) -> Self {
        Self {
            masks,
            emails,
            domains,
        }
    }

    /// Masks of a user, newest first
    pub async fn list(&self, user_id: UserId) -> MaskResult<Vec<MaskSummary>> {
        Ok(self.masks.list_masks(user_id).await?)
    }

    /// Create `name@domain` forwarding to `request.email`
    ///
    /// # Errors
    ///
    /// * `MaskError::InvalidAddress` - the combined address is malformed
    /// * `MaskError::DomainNotFound` - domain is not allow-listed
    /// * `MaskError::AlreadyExists` - the address is taken by anyone
    /// * `MaskError::EmailNotOwned` / `MaskError::EmailNotVerified` - bad forward-to address
    pub async fn add(&self, user_id: UserId, request: &AddMaskRequest) -> MaskResult<MaskSummary> {
        let domain = request.domain.trim().to_lowercase();
        let mask = format!("{}@{}", request.name.trim(), domain).to_lowercase();
        if !is_valid_mask(&mask) {
            return Err(MaskError::InvalidAddress);
        }

        if self.domains.get(&domain).await.is_none() {
            return Err(MaskError::DomainNotFound);
        }

        if self.masks.mask_exists(&mask).await? {
            return Err(MaskError::AlreadyExists);
        }

        let forward_to = self
            .emails
            .find_email(user_id, &normalize_address(&request.email))
            .await?
            .ok_or(MaskError::EmailNotOwned)?;
        if !forward_to.is_verified {
            return Err(MaskError::EmailNotVerified);
        }

        self.masks
            .create_mask(&NewMask {
                mask: mask.clone(),
                user_id,
                forward_to: forward_to.id,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation => MaskError::AlreadyExists,
                other => MaskError::Store(other),
            })?;
        log::info!("User {} created mask {}", user_id, mask);

        Ok(MaskSummary {
            mask,
            email: forward_to.email,
            enabled: true,
            messages_received: 0,
            messages_forwarded: 0,
        })
    }

    /// Delete one of the caller's masks
    pub async fn delete(&self, user_id: UserId, mask: &str) -> MaskResult<()> {
        let mask = Self::requested_mask(mask)?;
        if !self.masks.delete_mask(user_id, &mask).await? {
            return Err(MaskError::MaskNotOwned);
        }
        Ok(())
    }

    /// Enable or disable forwarding for one of the caller's masks
    pub async fn set_status(&self, user_id: UserId, mask: &str, enabled: bool) -> MaskResult<()> {
        let mask = Self::requested_mask(mask)?;
        if !self.masks.set_mask_enabled(user_id, &mask, enabled).await? {
            return Err(MaskError::MaskNotOwned);
        }
        Ok(())
    }

    fn requested_mask(mask: &str) -> MaskResult<String> {
        let mask = mask.trim().to_lowercase();
        if mask.is_empty() {
            return Err(MaskError::MissingMask);
        }
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthMethod, NewAccount};
    use crate::db::{AccountRepository, MemoryStore};
    use crate::verification::PendingCode;
    use uuid::Uuid;

    async fn setup() -> (MaskManager, Arc<MemoryStore>, UserId) {
        let store = Arc::new(MemoryStore::new());
        store.insert_domain("mask.io", true).await;
        let domains = Arc::new(DomainCache::load(store.clone()).await.unwrap());

        let user_id = Uuid::new_v4();
        store
            .create_account(&NewAccount {
                user_id,
                email: "owner@x.io".to_string(),
                display_name: String::new(),
                password_hash: None,
                method: AuthMethod::Email,
                provider_id: Uuid::new_v4().to_string(),
                consume_signup_code: false,
            })
            .await
            .unwrap();

        (
            MaskManager::new(store.clone(), store.clone(), domains),
            store,
            user_id,
        )
    }

    fn request(name: &str, domain: &str, email: &str) -> AddMaskRequest {
        AddMaskRequest {
            name: name.to_string(),
            domain: domain.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_mask_shape() {
        assert!(is_valid_mask("shop.news+1@mask.io"));
        assert!(!is_valid_mask("Shop@mask.io"));
        assert!(!is_valid_mask("a@b@mask.io"));
        assert!(!is_valid_mask("@mask.io"));
        assert!(!is_valid_mask("shop@mask"));
    }

    #[tokio::test]
    async fn test_add_lowercases_and_lists() {
        let (masks, _, user_id) = setup().await;

        let created = masks
            .add(user_id, &request("Shopping", "MASK.io", "owner@x.io"))
            .await
            .unwrap();
        assert_eq!(created.mask, "shopping@mask.io");

        let listed = masks.list(user_id).await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_domain() {
        let (masks, _, user_id) = setup().await;
        let err = masks
            .add(user_id, &request("shop", "other.io", "owner@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaskError::DomainNotFound));
    }

    #[tokio::test]
    async fn test_add_rejects_bad_name() {
        let (masks, _, user_id) = setup().await;
        let err = masks
            .add(user_id, &request("sh op", "mask.io", "owner@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaskError::InvalidAddress));
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate() {
        let (masks, _, user_id) = setup().await;
        masks
            .add(user_id, &request("shop", "mask.io", "owner@x.io"))
            .await
            .unwrap();

        let err = masks
            .add(user_id, &request("SHOP", "mask.io", "owner@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaskError::AlreadyExists));
    }

    #[tokio::test]
    async fn test_add_requires_owned_verified_email() {
        let (masks, store, user_id) = setup().await;

        let err = masks
            .add(user_id, &request("shop", "mask.io", "stranger@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaskError::EmailNotOwned));

        let pending = PendingCode {
            code_hash: "hash".to_string(),
            expires_at: i64::MAX,
        };
        store
            .create_email(user_id, "second@x.io", &pending)
            .await
            .unwrap();

        let err = masks
            .add(user_id, &request("shop", "mask.io", "second@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaskError::EmailNotVerified));
    }

    #[tokio::test]
    async fn test_delete_and_status_require_ownership() {
        let (masks, _, user_id) = setup().await;
        masks
            .add(user_id, &request("shop", "mask.io", "owner@x.io"))
            .await
            .unwrap();
        let stranger = Uuid::new_v4();

        assert!(matches!(
            masks.set_status(stranger, "shop@mask.io", false).await,
            Err(MaskError::MaskNotOwned)
        ));
        assert!(matches!(
            masks.delete(stranger, "shop@mask.io").await,
            Err(MaskError::MaskNotOwned)
        ));

        masks.set_status(user_id, "shop@mask.io", false).await.unwrap();
        assert!(!masks.list(user_id).await.unwrap()[0].enabled);

        masks.delete(user_id, "Shop@Mask.io").await.unwrap();
        assert!(masks.list(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_mask_value() {
        let (masks, _, user_id) = setup().await;
        assert!(matches!(
            masks.delete(user_id, "  ").await,
            Err(MaskError::MissingMask)
        ));
    }
}
