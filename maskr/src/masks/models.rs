//! Mask models.

use crate::auth::UserId;
use serde::{Deserialize, Serialize};

/// A mask as listed to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskSummary {
    pub mask: String,
    /// Address the mask forwards to
    pub email: String,
    pub enabled: bool,
    pub messages_received: i64,
    pub messages_forwarded: i64,
}

/// A mask about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMask {
    pub mask: String,
    pub user_id: UserId,
    /// Id of a verified email owned by `user_id`
    pub forward_to: i64,
}

/// Where mail for a mask goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskTarget {
    pub email: String,
    pub enabled: bool,
}

/// Body of `POST /masks/new`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMaskRequest {
    pub name: String,
    pub domain: String,
    pub email: String,
}

/// Body of `PUT /masks/{mask}/status`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaskStatusRequest {
    pub enabled: bool,
}
