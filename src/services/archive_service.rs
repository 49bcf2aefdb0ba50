//! src/services/archive_service.rs
//!
//! ArchiveService: lifecycle of archive records across the four buckets.
//!
//! ```text
//!   Community  <── move ──>  Official
//!      │  ^                    │  ^
//!  delete restore          delete restore
//!      v  │                    v  │
//!  DeletedCommunity        DeletedOfficial ── permanent delete ──> gone
//! ```
//!
//! Every bucket change is a copy into the target collection followed by a
//! delete from the source, executed in one SQLite transaction. If anything
//! fails the transaction rolls back and the record stays where it was. Two
//! operations racing on the same id serialize on the write lock; the loser
//! reads nothing from its source bucket and gets `NotFound`.
//!
//! Permanent deletion removes the blob first and the metadata second. A
//! metadata failure after the blob is gone leaves a record pointing at a
//! missing blob; that case has its own error variant and is never folded into
//! a generic failure.
//!
//! Nothing here retries. Callers that see `UpstreamUnavailable` on a move
//! must re-read both buckets before trying again.

use crate::{
    auth::Caller,
    models::{
        archive::{ArchiveRecord, ArchiveTransition, CreateArchive, PermanentDeletion},
        bucket::ArchiveBucket,
        quiz::QuizData,
    },
    services::{
        blob_deleter::BlobDeleter,
        blob_store::{BlobError, BlobStore},
    },
};
use bytes::Bytes;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const ARCHIVE_PATH_PREFIX: &str = "archives/";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("archive `{id}` not found in `{bucket}`")]
    NotFound { bucket: ArchiveBucket, id: String },
    #[error("cannot {operation} an archive in `{bucket}`")]
    InvalidTransition {
        operation: &'static str,
        bucket: ArchiveBucket,
    },
    #[error("invalid archive: {0}")]
    InvalidArchive(String),
    #[error("blob `{path}` could not be deleted: {reason}; metadata left untouched")]
    StorageDeleteFailed { path: String, reason: String },
    #[error(
        "blob `{path}` was removed but archive `{id}` could not be deleted from `{bucket}`: {reason}"
    )]
    MetadataDeleteFailedAfterBlobRemoved {
        bucket: ArchiveBucket,
        id: String,
        path: String,
        reason: String,
    },
    #[error("admin privileges are required to {0}")]
    PermissionDenied(&'static str),
    #[error("upstream store unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl From<sqlx::Error> for LifecycleError {
    fn from(err: sqlx::Error) -> Self {
        LifecycleError::UpstreamUnavailable(err.to_string())
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

const SELECT_COLUMNS: &str = "SELECT id, title, description, uploader, uploader_id, questions_count, \
     storage_path, download_count, created_at FROM archives";

#[derive(Clone)]
pub struct ArchiveService {
    db: Arc<SqlitePool>,
    blobs: BlobStore,
    deleter: Arc<dyn BlobDeleter>,
}

impl ArchiveService {
    pub fn new(db: Arc<SqlitePool>, blobs: BlobStore, deleter: Arc<dyn BlobDeleter>) -> Self {
        Self { db, blobs, deleter }
    }

    /// Deleted buckets are only visible to admins.
    fn ensure_readable(caller: Option<&Caller>, bucket: ArchiveBucket) -> LifecycleResult<()> {
        if bucket.is_deleted() && !caller.is_some_and(|c| c.is_admin) {
            return Err(LifecycleError::PermissionDenied("view deleted archives"));
        }
        Ok(())
    }

    fn ensure_admin(caller: &Caller, action: &'static str) -> LifecycleResult<()> {
        if !caller.is_admin {
            warn!("{} denied to non-admin {}", action, caller.uid);
            return Err(LifecycleError::PermissionDenied(action));
        }
        Ok(())
    }

    /// Full-collection read, newest first. No pagination.
    pub async fn list(
        &self,
        caller: Option<&Caller>,
        bucket: ArchiveBucket,
    ) -> LifecycleResult<Vec<ArchiveRecord>> {
        Self::ensure_readable(caller, bucket)?;
        let records = sqlx::query_as::<_, ArchiveRecord>(&format!(
            "{SELECT_COLUMNS} WHERE collection = ? ORDER BY created_at DESC, id ASC"
        ))
        .bind(bucket.collection_name())
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }

    pub async fn get(
        &self,
        caller: Option<&Caller>,
        bucket: ArchiveBucket,
        id: &str,
    ) -> LifecycleResult<ArchiveRecord> {
        Self::ensure_readable(caller, bucket)?;
        let mut conn = self.db.acquire().await?;
        fetch_record(&mut conn, bucket, id).await
    }

    /// Quiz JSON referenced by a record.
    pub async fn content(
        &self,
        caller: Option<&Caller>,
        bucket: ArchiveBucket,
        id: &str,
    ) -> LifecycleResult<(ArchiveRecord, Bytes)> {
        let record = self.get(caller, bucket, id).await?;
        let path = record.storage_path.clone().ok_or_else(|| {
            LifecycleError::InvalidArchive(format!("archive `{}` has no stored content", id))
        })?;
        let bytes = self.blobs.read(&path).await.map_err(|err| match err {
            BlobError::NotFound(path) => {
                LifecycleError::InvalidArchive(format!("content blob `{}` is missing", path))
            }
            other => LifecycleError::UpstreamUnavailable(other.to_string()),
        })?;
        Ok((record, bytes))
    }

    /// Register an uploaded quiz blob as a new record.
    ///
    /// Community uploads need any authenticated caller; official uploads need
    /// an admin. Title, description and question count are read from the blob.
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateArchive,
    ) -> LifecycleResult<ArchiveRecord> {
        match request.bucket {
            ArchiveBucket::Community => {}
            ArchiveBucket::Official => Self::ensure_admin(caller, "publish official archives")?,
            deleted => {
                return Err(LifecycleError::InvalidTransition {
                    operation: "create",
                    bucket: deleted,
                });
            }
        }

        let path = request.storage_path.trim();
        if !path.starts_with(ARCHIVE_PATH_PREFIX) || !path.ends_with(".json") {
            return Err(LifecycleError::InvalidArchive(format!(
                "storagePath `{}` must be an `{}*.json` blob",
                path, ARCHIVE_PATH_PREFIX
            )));
        }
        let raw = self.blobs.read(path).await.map_err(|err| match err {
            BlobError::NotFound(path) => {
                LifecycleError::InvalidArchive(format!("no uploaded blob at `{}`", path))
            }
            BlobError::InvalidPath(path) => {
                LifecycleError::InvalidArchive(format!("invalid storagePath `{}`", path))
            }
            BlobError::Io(err) => LifecycleError::UpstreamUnavailable(err.to_string()),
        })?;
        let quiz: QuizData = serde_json::from_slice(&raw)
            .map_err(|err| LifecycleError::InvalidArchive(format!("quiz JSON: {}", err)))?;

        let title = quiz.metadata.title.trim();
        if title.is_empty() {
            return Err(LifecycleError::InvalidArchive(
                "metadata.title is required".into(),
            ));
        }
        let questions_count = quiz.questions_count();
        if questions_count < 0 {
            return Err(LifecycleError::InvalidArchive(
                "metadata.num_questions must not be negative".into(),
            ));
        }

        let record = ArchiveRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: quiz.metadata.description.clone(),
            uploader: caller.label(),
            uploader_id: Some(caller.uid.clone()),
            questions_count,
            storage_path: Some(path.to_string()),
            download_count: 0,
            created_at: Utc::now(),
        };

        let mut conn = self.db.acquire().await?;
        insert_record(&mut conn, request.bucket, &record).await?;
        info!(
            "created archive {} in {} by {}",
            record.id, request.bucket, caller.uid
        );
        Ok(record)
    }

    /// Move along the fixed transition table: live buckets swap, deleted
    /// buckets restore.
    pub async fn move_record(
        &self,
        caller: &Caller,
        source: ArchiveBucket,
        id: &str,
    ) -> LifecycleResult<ArchiveTransition> {
        Self::ensure_admin(caller, "move archives")?;
        self.transfer(source, source.move_target(), id).await
    }

    pub async fn soft_delete(
        &self,
        caller: &Caller,
        source: ArchiveBucket,
        id: &str,
    ) -> LifecycleResult<ArchiveTransition> {
        Self::ensure_admin(caller, "delete archives")?;
        let target = source
            .soft_delete_target()
            .ok_or(LifecycleError::InvalidTransition {
                operation: "delete",
                bucket: source,
            })?;
        self.transfer(source, target, id).await
    }

    pub async fn restore(
        &self,
        caller: &Caller,
        source: ArchiveBucket,
        id: &str,
    ) -> LifecycleResult<ArchiveTransition> {
        Self::ensure_admin(caller, "restore archives")?;
        let target = source
            .restore_target()
            .ok_or(LifecycleError::InvalidTransition {
                operation: "restore",
                bucket: source,
            })?;
        self.transfer(source, target, id).await
    }

    /// Copy the record into `target` and delete it from `source`.
    ///
    /// The copy is an upsert keyed by id, so a target row left behind by an
    /// earlier interrupted move is overwritten rather than duplicated.
    async fn transfer(
        &self,
        source: ArchiveBucket,
        target: ArchiveBucket,
        id: &str,
    ) -> LifecycleResult<ArchiveTransition> {
        let mut tx = self.db.begin().await?;

        let record = fetch_record(&mut tx, source, id).await?;
        insert_record(&mut tx, target, &record).await?;

        let deleted = sqlx::query("DELETE FROM archives WHERE collection = ? AND id = ?")
            .bind(source.collection_name())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(LifecycleError::NotFound {
                bucket: source,
                id: id.to_string(),
            });
        }

        tx.commit().await?;
        info!("moved archive {} from {} to {}", id, source, target);

        Ok(ArchiveTransition {
            id: id.to_string(),
            from: source,
            to: target,
            record,
        })
    }

    /// Irreversibly remove a soft-deleted record and its blob.
    ///
    /// 1. Reject unless the record sits in a deleted bucket.
    /// 2. Delete the blob through the configured deleter. On failure nothing
    ///    else happens.
    /// 3. Delete the metadata row.
    pub async fn permanent_delete(
        &self,
        caller: &Caller,
        bucket: ArchiveBucket,
        id: &str,
    ) -> LifecycleResult<PermanentDeletion> {
        Self::ensure_admin(caller, "permanently delete archives")?;
        if !bucket.is_deleted() {
            return Err(LifecycleError::InvalidTransition {
                operation: "permanently delete",
                bucket,
            });
        }

        let record = {
            let mut conn = self.db.acquire().await?;
            fetch_record(&mut conn, bucket, id).await?
        };

        let blob_removed = match record.storage_path.as_deref() {
            Some(path) => {
                self.deleter
                    .delete_blob(path, caller)
                    .await
                    .map_err(|err| {
                        warn!("permanent delete of {} aborted: {}", id, err);
                        LifecycleError::StorageDeleteFailed {
                            path: path.to_string(),
                            reason: err.to_string(),
                        }
                    })?;
                true
            }
            None => {
                debug!("archive {} has no blob, deleting metadata only", id);
                false
            }
        };

        let result = sqlx::query("DELETE FROM archives WHERE collection = ? AND id = ?")
            .bind(bucket.collection_name())
            .bind(id)
            .execute(&*self.db)
            .await;

        let result_was_empty = matches!(&result, Ok(done) if done.rows_affected() == 0);
        let failure = match result {
            Ok(done) if done.rows_affected() == 1 => None,
            Ok(_) => Some("record disappeared before it could be deleted".to_string()),
            Err(err) => Some(err.to_string()),
        };

        if let Some(reason) = failure {
            return Err(match record.storage_path {
                Some(path) if blob_removed => {
                    error!(
                        "archive {} in {} still references removed blob {}: {}",
                        id, bucket, path, reason
                    );
                    LifecycleError::MetadataDeleteFailedAfterBlobRemoved {
                        bucket,
                        id: id.to_string(),
                        path,
                        reason,
                    }
                }
                _ if result_was_empty => LifecycleError::NotFound {
                    bucket,
                    id: id.to_string(),
                },
                _ => LifecycleError::UpstreamUnavailable(reason),
            });
        }

        info!("permanently deleted archive {} from {}", id, bucket);
        Ok(PermanentDeletion {
            id: id.to_string(),
            bucket,
            storage_path: record.storage_path,
            blob_removed,
        })
    }
}

async fn fetch_record(
    conn: &mut SqliteConnection,
    bucket: ArchiveBucket,
    id: &str,
) -> LifecycleResult<ArchiveRecord> {
    sqlx::query_as::<_, ArchiveRecord>(&format!(
        "{SELECT_COLUMNS} WHERE collection = ? AND id = ?"
    ))
    .bind(bucket.collection_name())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| LifecycleError::NotFound {
        bucket,
        id: id.to_string(),
    })
}

/// Write `record` verbatim into `bucket`, replacing a row with the same id.
async fn insert_record(
    conn: &mut SqliteConnection,
    bucket: ArchiveBucket,
    record: &ArchiveRecord,
) -> LifecycleResult<()> {
    sqlx::query(
        r#"
        INSERT INTO archives (
            collection, id, title, description, uploader, uploader_id,
            questions_count, storage_path, download_count, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(collection, id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            uploader = excluded.uploader,
            uploader_id = excluded.uploader_id,
            questions_count = excluded.questions_count,
            storage_path = excluded.storage_path,
            download_count = excluded.download_count,
            created_at = excluded.created_at
        "#,
    )
    .bind(bucket.collection_name())
    .bind(&record.id)
    .bind(&record.title)
    .bind(&record.description)
    .bind(&record.uploader)
    .bind(&record.uploader_id)
    .bind(record.questions_count)
    .bind(&record.storage_path)
    .bind(record.download_count)
    .bind(record.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
