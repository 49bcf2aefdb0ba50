//! Identity directory entries, profile documents and the admin listing row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An account in the identity directory.
///
/// `admin_claim` is the custom claim that gets minted into identity tokens.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub admin_claim: bool,
    pub created_at: DateTime<Utc>,
}

/// The profile document kept alongside the directory entry.
///
/// `is_admin` mirrors the claim for display purposes and can drift from it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// One row of the admin listing: claim state next to profile state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub uid: String,
    pub email: Option<String>,
    pub token_is_admin: bool,
    pub firestore_is_admin: bool,
}

/// Reply of the claim management operations.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AdminMessage {
    pub message: String,
}
