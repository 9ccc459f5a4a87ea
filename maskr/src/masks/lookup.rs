//! Mask resolution for the mail pipeline.

use super::models::MaskTarget;
use crate::db::{MaskRepository, StoreError};
use crate::domains::DomainCache;
use std::sync::Arc;
use thiserror::Error;

/// Lookup errors, mirroring invalid-argument / not-found / unavailable status codes
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("invalid mask address")]
    InvalidAddress,

    #[error("invalid mask domain")]
    InvalidDomain,

    #[error("mask not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Result type for mask lookups
pub type LookupResult<T> = Result<T, LookupError>;

/// Read path used by the mail pipeline
///
/// Every call checks the address shape and the domain against the cached
/// allow-list before any store access.
#[derive(Clone)]
pub struct MaskLookup {
    masks: Arc<dyn MaskRepository>,
    domains: Arc<DomainCache>,
}

impl MaskLookup {
    pub fn new(masks: Arc<dyn MaskRepository>, domains: Arc<DomainCache>) -> Self {
        Self { masks, domains }
    }

    /// Whether the mask exists
    pub async fn check_mask(&self, address: &str) -> LookupResult<bool> {
        let mask = self.validate(address).await?;
        if !self.masks.mask_exists(&mask).await? {
            return Err(LookupError::NotFound);
        }
        Ok(true)
    }

    /// Forwarding target and enabled flag of a mask
    pub async fn get_mask(&self, address: &str) -> LookupResult<MaskTarget> {
        let mask = self.validate(address).await?;
        self.masks
            .find_mask_target(&mask)
            .await?
            .ok_or(LookupError::NotFound)
    }

    /// Count a forwarded message (also counts it as received)
    pub async fn increment_forwarded_count(&self, address: &str) -> LookupResult<()> {
        let mask = self.validate(address).await?;
        if !self.masks.increment_forwarded(&mask).await? {
            return Err(LookupError::NotFound);
        }
        Ok(())
    }

    /// Count a received message that was not forwarded
    pub async fn increment_received_count(&self, address: &str) -> LookupResult<()> {
        let mask = self.validate(address).await?;
        if !self.masks.increment_received(&mask).await? {
            return Err(LookupError::NotFound);
        }
        Ok(())
    }

    async fn validate(&self, address: &str) -> LookupResult<String> {
        let mask = address.trim().to_lowercase();
        let mut parts = mask.split('@');
        let (Some(_), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(LookupError::InvalidAddress);
        };

        if self.domains.get(domain).await.is_none() {
            return Err(LookupError::InvalidDomain);
        }

        Ok(mask)
    }
}
