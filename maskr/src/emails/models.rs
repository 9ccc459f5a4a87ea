//! Forwarding address models.

use crate::auth::UserId;
use serde::{Deserialize, Serialize};

/// An email address owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    pub email: String,
    pub is_primary: bool,
    pub is_verified: bool,
}

/// Body of `POST /emails/new`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddEmailRequest {
    pub email: String,
}

/// Body of `POST /emails/{email}/verify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub code: String,
}
