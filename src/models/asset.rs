//! Image assets used by the quiz apps: tag icons and quiz backgrounds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    #[serde(rename = "qTagIcons")]
    TagIcon,
    #[serde(rename = "quizBackgrounds")]
    QuizBackground,
}

impl AssetKind {
    /// Collection name, also used as the blob path prefix.
    pub fn collection_name(self) -> &'static str {
        match self {
            AssetKind::TagIcon => "qTagIcons",
            AssetKind::QuizBackground => "quizBackgrounds",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qTagIcons" => Ok(AssetKind::TagIcon),
            "quizBackgrounds" => Ok(AssetKind::QuizBackground),
            other => Err(format!("unknown asset kind `{}`", other)),
        }
    }
}

impl TryFrom<String> for AssetKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A stored image plus its labels.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,

    /// Stored as the collection name.
    #[sqlx(try_from = "String")]
    pub kind: AssetKind,

    /// File stem, used by the apps as a stable key (`bgId`).
    pub slug: String,

    pub file_name: String,

    pub storage_path: String,

    pub label_ko: Option<String>,
    pub label_en: Option<String>,
    pub label_ko_lowercase: Option<String>,
    pub label_en_lowercase: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Labels supplied with an upload.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AssetLabels {
    pub label_ko: Option<String>,
    pub label_en: Option<String>,
}
