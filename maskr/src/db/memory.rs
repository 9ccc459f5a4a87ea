//! In-memory implementation of the repository traits.
//!
//! Mirrors the PostgreSQL schema's constraints (unique emails per user, unique
//! masks, masks blocking email deletion, transactional account creation) so flow
//! tests exercise the same failure paths as production.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use super::{
    errors::{StoreError, StoreResult},
    repository::{
        AccountRepository, DomainRepository, EmailRepository, HealthCheck, MaskRepository,
        UserRepository, VerificationRepository,
    },
};
use crate::auth::{AuthMethod, NewAccount, Provider, User, UserId};
use crate::domains::Domain;
use crate::emails::Email;
use crate::masks::{MaskSummary, MaskTarget, NewMask};
use crate::verification::PendingCode;

#[derive(Debug, Clone)]
struct StoredMask {
    enabled: bool,
    forward_to: i64,
    user_id: UserId,
    messages_received: i64,
    messages_forwarded: i64,
    sequence: u64,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    providers: HashMap<(AuthMethod, String), Provider>,
    emails: BTreeMap<i64, Email>,
    next_email_id: i64,
    account_codes: HashMap<String, PendingCode>,
    email_codes: HashMap<i64, PendingCode>,
    reset_codes: HashMap<UserId, PendingCode>,
    masks: HashMap<String, StoredMask>,
    next_mask_sequence: u64,
    domains: BTreeMap<String, Domain>,
}

/// Repository implementation held in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an allow-listed domain
    pub async fn insert_domain(&self, domain: &str, free: bool) {
        self.state.write().await.domains.insert(
            domain.to_string(),
            Domain {
                domain: domain.to_string(),
                free,
            },
        );
    }

    pub async fn remove_domain(&self, domain: &str) {
        self.state.write().await.domains.remove(domain);
    }

    /// Make every operation fail as if the database were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(Duration::from_secs(5)));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, user_id: UserId) -> StoreResult<Option<User>> {
        self.check_available()?;
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_by_login_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state
            .providers
            .values()
            .filter(|p| p.method == AuthMethod::Email)
            .filter_map(|p| state.users.get(&p.user_id))
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_provider(
        &self,
        method: AuthMethod,
        provider_id: &str,
    ) -> StoreResult<Option<Provider>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .providers
            .get(&(method, provider_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create_account(&self, account: &NewAccount) -> StoreResult<User> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let provider_key = (account.method, account.provider_id.clone());
        if state.users.contains_key(&account.user_id) || state.providers.contains_key(&provider_key)
        {
            return Err(StoreError::UniqueViolation);
        }
        if account.consume_signup_code && !state.account_codes.contains_key(&account.email) {
            return Err(StoreError::NotFound);
        }

        // All checks passed; apply every write together
        if account.consume_signup_code {
            state.account_codes.remove(&account.email);
        }

        let now = Utc::now();
        let user = User {
            id: account.user_id,
            display_name: account.display_name.clone(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            role: 0,
            token_version: 1,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        state.providers.insert(
            provider_key,
            Provider {
                id: account.provider_id.clone(),
                method: account.method,
                user_id: account.user_id,
            },
        );

        state.next_email_id += 1;
        let email_id = state.next_email_id;
        state.emails.insert(
            email_id,
            Email {
                id: email_id,
                user_id: account.user_id,
                email: account.email.clone(),
                is_primary: true,
                is_verified: true,
            },
        );

        Ok(user)
    }

    async fn update_password(
        &self,
        user_id: UserId,
        password_hash: &str,
        expected_version: i32,
    ) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        match state.users.get_mut(&user_id) {
            Some(user) if user.token_version == expected_version => {
                user.password_hash = Some(password_hash.to_string());
                user.token_version += 1;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl VerificationRepository for MemoryStore {
    async fn find_account_code(&self, email: &str) -> StoreResult<Option<PendingCode>> {
        self.check_available()?;
        Ok(self.state.read().await.account_codes.get(email).cloned())
    }

    async fn upsert_account_code(&self, email: &str, code: &PendingCode) -> StoreResult<()> {
        self.check_available()?;
        self.state
            .write()
            .await
            .account_codes
            .insert(email.to_string(), code.clone());
        Ok(())
    }

    async fn find_email_code(&self, email_id: i64) -> StoreResult<Option<PendingCode>> {
        self.check_available()?;
        Ok(self.state.read().await.email_codes.get(&email_id).cloned())
    }

    async fn upsert_email_code(&self, email_id: i64, code: &PendingCode) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if !state.emails.contains_key(&email_id) {
            return Err(StoreError::ForeignKeyViolation);
        }
        state.email_codes.insert(email_id, code.clone());
        Ok(())
    }

    async fn find_reset_code(&self, user_id: UserId) -> StoreResult<Option<PendingCode>> {
        self.check_available()?;
        Ok(self.state.read().await.reset_codes.get(&user_id).cloned())
    }

    async fn upsert_reset_code(&self, user_id: UserId, code: &PendingCode) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::ForeignKeyViolation);
        }
        state.reset_codes.insert(user_id, code.clone());
        Ok(())
    }

    async fn delete_reset_code(&self, user_id: UserId) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self
            .state
            .write()
            .await
            .reset_codes
            .remove(&user_id)
            .is_some())
    }
}

#[async_trait]
impl EmailRepository for MemoryStore {
    async fn list_emails(&self, user_id: UserId) -> StoreResult<Vec<Email>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut emails: Vec<Email> = state
            .emails
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        // Primary first, then insertion order
        emails.sort_by_key(|e| (!e.is_primary, e.id));
        Ok(emails)
    }

    async fn find_email(&self, user_id: UserId, address: &str) -> StoreResult<Option<Email>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .emails
            .values()
            .find(|e| e.user_id == user_id && e.email == address)
            .cloned())
    }

    async fn create_email(
        &self,
        user_id: UserId,
        address: &str,
        code: &PendingCode,
    ) -> StoreResult<Email> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.users.contains_key(&user_id) {
            return Err(StoreError::ForeignKeyViolation);
        }
        if state
            .emails
            .values()
            .any(|e| e.user_id == user_id && e.email == address)
        {
            return Err(StoreError::UniqueViolation);
        }

        state.next_email_id += 1;
        let email = Email {
            id: state.next_email_id,
            user_id,
            email: address.to_string(),
            is_primary: false,
            is_verified: false,
        };
        state.emails.insert(email.id, email.clone());
        state.email_codes.insert(email.id, code.clone());

        Ok(email)
    }

    async fn mark_verified(&self, email_id: i64) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        state.email_codes.remove(&email_id);
        match state.emails.get_mut(&email_id) {
            Some(email) => {
                email.is_verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_email(&self, email_id: i64) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.masks.values().any(|m| m.forward_to == email_id) {
            return Err(StoreError::ForeignKeyViolation);
        }

        state.email_codes.remove(&email_id);
        Ok(state.emails.remove(&email_id).is_some())
    }
}

#[async_trait]
impl MaskRepository for MemoryStore {
    async fn list_masks(&self, user_id: UserId) -> StoreResult<Vec<MaskSummary>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut owned: Vec<(&String, &StoredMask)> = state
            .masks
            .iter()
            .filter(|(_, m)| m.user_id == user_id)
            .collect();
        owned.sort_by(|a, b| b.1.sequence.cmp(&a.1.sequence));

        Ok(owned
            .into_iter()
            .filter_map(|(mask, stored)| {
                let email = state.emails.get(&stored.forward_to)?;
                Some(MaskSummary {
                    mask: mask.clone(),
                    email: email.email.clone(),
                    enabled: stored.enabled,
                    messages_received: stored.messages_received,
                    messages_forwarded: stored.messages_forwarded,
                })
            })
            .collect())
    }

    async fn mask_exists(&self, mask: &str) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.state.read().await.masks.contains_key(mask))
    }

    async fn create_mask(&self, mask: &NewMask) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.masks.contains_key(&mask.mask) {
            return Err(StoreError::UniqueViolation);
        }
        if !state.emails.contains_key(&mask.forward_to) || !state.users.contains_key(&mask.user_id)
        {
            return Err(StoreError::ForeignKeyViolation);
        }

        state.next_mask_sequence += 1;
        let sequence = state.next_mask_sequence;
        state.masks.insert(
            mask.mask.clone(),
            StoredMask {
                enabled: true,
                forward_to: mask.forward_to,
                user_id: mask.user_id,
                messages_received: 0,
                messages_forwarded: 0,
                sequence,
            },
        );
        Ok(())
    }

    async fn delete_mask(&self, user_id: UserId, mask: &str) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let owned = state.masks.get(mask).is_some_and(|m| m.user_id == user_id);
        if owned {
            state.masks.remove(mask);
        }
        Ok(owned)
    }

    async fn set_mask_enabled(
        &self,
        user_id: UserId,
        mask: &str,
        enabled: bool,
    ) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        match state.masks.get_mut(mask) {
            Some(stored) if stored.user_id == user_id => {
                stored.enabled = enabled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_mask_target(&self, mask: &str) -> StoreResult<Option<MaskTarget>> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state.masks.get(mask).and_then(|stored| {
            state.emails.get(&stored.forward_to).map(|email| MaskTarget {
                email: email.email.clone(),
                enabled: stored.enabled,
            })
        }))
    }

    async fn increment_received(&self, mask: &str) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        Ok(state
            .masks
            .get_mut(mask)
            .map(|stored| stored.messages_received += 1)
            .is_some())
    }

    async fn increment_forwarded(&self, mask: &str) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        Ok(state
            .masks
            .get_mut(mask)
            .map(|stored| {
                stored.messages_received += 1;
                stored.messages_forwarded += 1;
            })
            .is_some())
    }
}

#[async_trait]
impl DomainRepository for MemoryStore {
    async fn list_domains(&self) -> StoreResult<Vec<Domain>> {
        self.check_available()?;
        Ok(self.state.read().await.domains.values().cloned().collect())
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pending() -> PendingCode {
        PendingCode {
            code_hash: "$argon2id$stub".to_string(),
            expires_at: Utc::now().timestamp() + 300,
        }
    }

    fn account(email: &str, consume: bool) -> NewAccount {
        NewAccount {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: String::new(),
            password_hash: Some("hash".to_string()),
            method: AuthMethod::Email,
            provider_id: Uuid::new_v4().to_string(),
            consume_signup_code: consume,
        }
    }

    #[tokio::test]
    async fn test_create_account_requires_pending_code() {
        let store = MemoryStore::new();

        let err = store
            .create_account(&account("a@example.com", true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert!(store.find_by_login_email("a@example.com").await.unwrap().is_none());

        store
            .upsert_account_code("a@example.com", &pending())
            .await
            .unwrap();
        let user = store
            .create_account(&account("a@example.com", true))
            .await
            .unwrap();

        assert_eq!(user.token_version, 1);
        assert!(store.find_account_code("a@example.com").await.unwrap().is_none());
        let emails = store.list_emails(user.id).await.unwrap();
        assert_eq!(emails.len(), 1);
        assert!(emails[0].is_primary && emails[0].is_verified);
    }

    #[tokio::test]
    async fn test_oauth_account_is_not_a_login_email() {
        let store = MemoryStore::new();
        let mut google = account("g@example.com", false);
        google.method = AuthMethod::Google;
        google.provider_id = "google-subject".to_string();
        google.password_hash = None;

        store.create_account(&google).await.unwrap();

        assert!(store.find_by_login_email("g@example.com").await.unwrap().is_none());
        assert!(
            store
                .find_provider(AuthMethod::Google, "google-subject")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_update_password_checks_version() {
        let store = MemoryStore::new();
        let user = store
            .create_account(&account("a@example.com", false))
            .await
            .unwrap();

        assert!(!store.update_password(user.id, "new", 2).await.unwrap());
        assert!(store.update_password(user.id, "new", 1).await.unwrap());

        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.token_version, 2);
        assert_eq!(user.password_hash.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_email_constraints() {
        let store = MemoryStore::new();
        let user = store
            .create_account(&account("a@example.com", false))
            .await
            .unwrap();

        let added = store
            .create_email(user.id, "b@example.com", &pending())
            .await
            .unwrap();
        assert!(!added.is_verified);
        assert!(store.find_email_code(added.id).await.unwrap().is_some());

        let err = store
            .create_email(user.id, "b@example.com", &pending())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));

        assert!(store.mark_verified(added.id).await.unwrap());
        assert!(store.find_email_code(added.id).await.unwrap().is_none());

        store
            .create_mask(&NewMask {
                mask: "m@relay.example.com".to_string(),
                user_id: user.id,
                forward_to: added.id,
            })
            .await
            .unwrap();
        let err = store.delete_email(added.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation));

        assert!(store.delete_mask(user.id, "m@relay.example.com").await.unwrap());
        assert!(store.delete_email(added.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_mask_ownership_and_counters() {
        let store = MemoryStore::new();
        let owner = store
            .create_account(&account("a@example.com", false))
            .await
            .unwrap();
        let primary = store.list_emails(owner.id).await.unwrap().remove(0);

        store
            .create_mask(&NewMask {
                mask: "m@relay.example.com".to_string(),
                user_id: owner.id,
                forward_to: primary.id,
            })
            .await
            .unwrap();

        let stranger = Uuid::new_v4();
        assert!(!store.delete_mask(stranger, "m@relay.example.com").await.unwrap());
        assert!(
            !store
                .set_mask_enabled(stranger, "m@relay.example.com", false)
                .await
                .unwrap()
        );

        assert!(store.increment_received("m@relay.example.com").await.unwrap());
        assert!(store.increment_forwarded("m@relay.example.com").await.unwrap());
        assert!(!store.increment_received("missing@relay.example.com").await.unwrap());

        let listed = store.list_masks(owner.id).await.unwrap();
        assert_eq!(listed[0].messages_received, 2);
        assert_eq!(listed[0].messages_forwarded, 1);
        assert_eq!(listed[0].email, "a@example.com");
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(store.ping().await, Err(StoreError::Timeout(_))));
        assert!(store.list_domains().await.is_err());

        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }
}
