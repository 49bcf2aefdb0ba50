//! User feedback submitted from the apps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    pub text: String,
    pub user_id: Option<String>,
    pub platform: String,
    pub app_version: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    pub text: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub app_version: String,
}
