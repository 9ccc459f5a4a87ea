//! Expiring key-value store.
//!
//! Rate-limit counters and revocation tombstones must be shared by every server
//! instance, so they live behind [`KeyValueStore`]. [`PgKeyValueStore`] keeps them in
//! the shared PostgreSQL database; [`MemoryKeyValueStore`] serves tests and
//! single-process development.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::db::StoreError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryKeyValueStore;
pub use postgres::PgKeyValueStore;

/// Key-value store errors
#[derive(Debug, Error)]
pub enum KvError {
    /// Backing store failure
    #[error("Key-value store error: {0}")]
    Store(#[from] StoreError),

    /// Stored value could not be interpreted
    #[error("Corrupt value for key {key}")]
    Corrupt { key: String },
}

/// Result type for key-value operations
pub type KvResult<T> = Result<T, KvError>;

/// String keys with per-key time to live
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Atomically increment the counter at `key`, returning the new value
    ///
    /// An absent or expired key starts a new window: it is set to 1 and expires
    /// after `window`. Increments within a window never extend it.
    async fn incr_window(&self, key: &str, window: Duration) -> KvResult<i64>;

    /// Store `value` at `key` for `ttl`, replacing any previous value and expiry
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;

    /// Read a live value
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Whether a live value exists at `key`
    async fn exists(&self, key: &str) -> KvResult<bool>;

    /// Round-trip to the backing store
    async fn ping(&self) -> KvResult<()>;
}
