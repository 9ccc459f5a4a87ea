//! Domain allow-list cache.
//!
//! Mask addresses may only use domains from the `domains` table. The table changes
//! rarely and is consulted on every mask lookup, so it is held in memory as an
//! immutable snapshot that a background task replaces wholesale.

use crate::db::{DomainRepository, StoreResult};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{RwLock, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

/// Default time between refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// An allow-listed mask domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub domain: String,
    /// Available without a paid plan
    pub free: bool,
}

type Snapshot = Arc<HashMap<String, Domain>>;

/// Periodically refreshed, case-insensitive view of the domain table
pub struct DomainCache {
    repository: Arc<dyn DomainRepository>,
    snapshot: RwLock<Snapshot>,
}

impl DomainCache {
    /// Create an empty cache; call [`refresh`](Self::refresh) before serving
    pub fn new(repository: Arc<dyn DomainRepository>) -> Self {
        Self {
            repository,
            snapshot: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Create a cache and load the first snapshot
    pub async fn load(repository: Arc<dyn DomainRepository>) -> StoreResult<Self> {
        let cache = Self::new(repository);
        cache.refresh().await?;
        Ok(cache)
    }

    /// Reload the table and swap in the new snapshot
    ///
    /// On error the previous snapshot stays in place. Returns the number of
    /// domains now cached.
    pub async fn refresh(&self) -> StoreResult<usize> {
        let domains = self.repository.list_domains().await?;
        let fresh: HashMap<String, Domain> = domains
            .into_iter()
            .map(|d| (d.domain.to_ascii_lowercase(), d))
            .collect();
        let count = fresh.len();

        *self.snapshot.write().await = Arc::new(fresh);
        Ok(count)
    }

    /// Look up a domain, ignoring case
    pub async fn get(&self, domain: &str) -> Option<Domain> {
        self.snapshot
            .read()
            .await
            .get(&domain.to_ascii_lowercase())
            .cloned()
    }

    /// All cached domains, sorted by name
    pub async fn values(&self) -> Vec<Domain> {
        let snapshot = Arc::clone(&*self.snapshot.read().await);
        let mut domains: Vec<Domain> = snapshot.values().cloned().collect();
        domains.sort_by(|a, b| a.domain.cmp(&b.domain));
        domains
    }

    /// Refresh every `period` until `shutdown` flips to `true` or its sender drops
    pub fn spawn_refresh(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.refresh().await {
                            Ok(count) => log::debug!("Domain cache refreshed ({} domains)", count),
                            Err(e) => log::error!("Domain cache refresh failed, keeping previous snapshot: {}", e),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            log::info!("Domain cache refresher stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}
