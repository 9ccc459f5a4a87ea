//! Revoked refresh tokens.

use super::errors::RevocationResult;
use crate::kv::KeyValueStore;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};

/// Tombstones for refresh tokens revoked before their natural expiry
///
/// Each tombstone lives exactly as long as the token it covers would have, so the
/// ledger never grows past the set of still-valid revoked tokens.
#[derive(Clone)]
pub struct RevocationLedger {
    store: Arc<dyn KeyValueStore>,
}

impl RevocationLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Whether a tombstone exists for `token`
    pub async fn is_revoked(&self, token: &str) -> RevocationResult<bool> {
        Ok(self.store.exists(&Self::key(token)).await?)
    }

    /// Tombstone `token` until `expires_at` (unix seconds)
    ///
    /// Returns `false` without writing when the token has already expired.
    /// Revoking twice simply rewrites the same tombstone.
    pub async fn revoke(&self, token: &str, expires_at: i64) -> RevocationResult<bool> {
        let remaining = expires_at - Utc::now().timestamp();
        if remaining <= 0 {
            return Ok(false);
        }

        let ttl = Duration::from_secs(remaining.unsigned_abs());
        self.store.set_ex(&Self::key(token), "1", ttl).await?;
        Ok(true)
    }

    fn key(token: &str) -> String {
        format!("revoked:{}", hex::encode(Sha256::digest(token.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;

    fn ledger() -> (RevocationLedger, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        (RevocationLedger::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_revoke_then_is_revoked() {
        let (ledger, _) = ledger();
        let exp = Utc::now().timestamp() + 600;

        assert!(!ledger.is_revoked("token-a").await.unwrap());
        assert!(ledger.revoke("token-a", exp).await.unwrap());
        assert!(ledger.is_revoked("token-a").await.unwrap());
        assert!(!ledger.is_revoked("token-b").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (ledger, store) = ledger();
        let exp = Utc::now().timestamp() + 600;

        ledger.revoke("token", exp).await.unwrap();
        ledger.revoke("token", exp).await.unwrap();

        assert!(ledger.is_revoked("token").await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_not_stored() {
        let (ledger, store) = ledger();

        assert!(!ledger.revoke("token", Utc::now().timestamp() - 1).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_key_does_not_contain_token() {
        let key = RevocationLedger::key("secret.jwt.value");
        assert!(key.starts_with("revoked:"));
        assert!(!key.contains("secret"));
        assert_eq!(key.len(), "revoked:".len() + 64);
    }
}
