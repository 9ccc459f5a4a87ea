//! In-process key-value store

use super::{KeyValueStore, KvError, KvResult};
use crate::db::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Key-value store held in process memory
///
/// Only correct for a single server instance. Expired entries are ignored on read
/// and dropped by [`purge_expired`](Self::purge_expired).
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, live or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Make every operation fail as if the store were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> KvResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(Duration::from_secs(5)).into());
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn incr_window(&self, key: &str, window: Duration) -> KvResult<i64> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                let count = entry
                    .value
                    .parse::<i64>()
                    .map_err(|_| KvError::Corrupt { key: key.to_string() })?
                    + 1;
                entry.value = count.to_string();
                Ok(count)
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: now + window,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        self.check_available()?;
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.check_available()?;
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ping(&self) -> KvResult<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_incr_window_counts_within_window() {
        let store = MemoryKeyValueStore::new();
        let window = Duration::from_secs(60);

        assert_eq!(store.incr_window("k", window).await.unwrap(), 1);
        assert_eq!(store.incr_window("k", window).await.unwrap(), 2);
        assert_eq!(store.incr_window("k", window).await.unwrap(), 3);
        assert_eq!(store.incr_window("other", window).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_window_restarts_after_expiry() {
        let store = MemoryKeyValueStore::new();
        let window = Duration::from_secs(10);

        store.incr_window("k", window).await.unwrap();
        store.incr_window("k", window).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(store.incr_window("k", window).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_expires() {
        let store = MemoryKeyValueStore::new();
        store
            .set_ex("tomb", "1", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(store.exists("tomb").await.unwrap());
        assert_eq!(store.get("tomb").await.unwrap().as_deref(), Some("1"));

        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(!store.exists("tomb").await.unwrap());
        assert_eq!(store.purge_expired().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let store = MemoryKeyValueStore::new();
        store.set_unavailable(true);

        let window = Duration::from_secs(60);
        assert!(matches!(
            store.incr_window("k", window).await,
            Err(KvError::Store(StoreError::Timeout(_)))
        ));
        assert!(store.set_ex("k", "1", window).await.is_err());
        assert!(store.exists("k").await.is_err());
        assert!(store.ping().await.is_err());

        store.set_unavailable(false);
        assert_eq!(store.incr_window("k", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_counter_is_reported() {
        let store = MemoryKeyValueStore::new();
        store
            .set_ex("k", "not-a-number", Duration::from_secs(60))
            .await
            .unwrap();

        let err = store
            .incr_window("k", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::Corrupt { .. }));
    }
}
