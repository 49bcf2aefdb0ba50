//! Represents an archive record: the metadata for one quiz bundle.

use super::bucket::ArchiveBucket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata for a quiz bundle whose content lives in the blob store.
///
/// The record carries no bucket field. Which collection it sits in is the
/// bucket, and moving it rewrites the row into another collection.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    /// Opaque identifier, stable across moves.
    pub id: String,

    pub title: String,

    pub description: String,

    /// Display name of the uploader at creation time.
    pub uploader: String,

    /// Identity of the uploader. Absent on legacy records.
    pub uploader_id: Option<String>,

    /// Number of questions declared by the quiz payload.
    pub questions_count: i64,

    /// Blob path of the quiz JSON (`archives/<name>.json`). Absent on legacy records.
    pub storage_path: Option<String>,

    pub download_count: i64,

    /// Assigned by the server at insert time, preserved verbatim on moves.
    pub created_at: DateTime<Utc>,
}

/// Request to register a new archive from an already uploaded blob.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateArchive {
    pub bucket: ArchiveBucket,
    pub storage_path: String,
}

/// Outcome of any bucket-changing operation.
///
/// Both `from` and `to` are returned so callers can refresh both views.
#[derive(Serialize, Debug, Clone)]
pub struct ArchiveTransition {
    pub id: String,
    pub from: ArchiveBucket,
    pub to: ArchiveBucket,
    pub record: ArchiveRecord,
}

/// Outcome of a permanent delete.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermanentDeletion {
    pub id: String,
    pub bucket: ArchiveBucket,
    pub storage_path: Option<String>,
    /// Whether a blob deletion was requested and confirmed.
    pub blob_removed: bool,
}
