//! src/services/asset_service.rs
//!
//! AssetService: tag icons and quiz backgrounds. Each asset is one blob at
//! `<kind>/<file name>` plus one row in `assets` carrying its labels.

use crate::{
    auth::Caller,
    models::asset::{Asset, AssetKind, AssetLabels},
    services::blob_store::{BlobError, BlobStore},
};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use sqlx::SqlitePool;
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "webp", "gif", "svg"];

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("asset `{id}` not found in `{kind}`")]
    NotFound { kind: AssetKind, id: String },
    #[error("an asset named `{0}` already exists")]
    AlreadyExists(String),
    #[error("admin privileges are required to {0}")]
    PermissionDenied(&'static str),
    #[error("blob `{path}` could not be deleted: {reason}")]
    StorageDeleteFailed { path: String, reason: String },
    #[error("upstream store unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl From<sqlx::Error> for AssetError {
    fn from(err: sqlx::Error) -> Self {
        AssetError::UpstreamUnavailable(err.to_string())
    }
}

impl From<BlobError> for AssetError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::InvalidPath(path) => {
                AssetError::InvalidArgument(format!("invalid file name `{}`", path))
            }
            other => AssetError::UpstreamUnavailable(other.to_string()),
        }
    }
}

const SELECT_ASSETS: &str = "SELECT id, kind, slug, file_name, storage_path, label_ko, label_en, \
     label_ko_lowercase, label_en_lowercase, created_at FROM assets";

#[derive(Clone)]
pub struct AssetService {
    db: Arc<SqlitePool>,
    blobs: BlobStore,
}

impl AssetService {
    pub fn new(db: Arc<SqlitePool>, blobs: BlobStore) -> Self {
        Self { db, blobs }
    }

    fn ensure_admin(caller: &Caller, action: &'static str) -> Result<(), AssetError> {
        if !caller.is_admin {
            warn!("{} denied to non-admin {}", action, caller.uid);
            return Err(AssetError::PermissionDenied(action));
        }
        Ok(())
    }

    /// Check that an upload is acceptable before any bytes are stored.
    ///
    /// Icons need at least one label, backgrounds need both.
    pub fn validate_upload(
        caller: &Caller,
        kind: AssetKind,
        file_name: &str,
        labels: &AssetLabels,
    ) -> Result<(String, String), AssetError> {
        Self::ensure_admin(caller, "upload assets")?;

        let file_name = sanitize_file_name(file_name)?;
        let label_ko = non_blank(&labels.label_ko);
        let label_en = non_blank(&labels.label_en);
        match kind {
            AssetKind::TagIcon if label_ko.is_none() && label_en.is_none() => {
                return Err(AssetError::InvalidArgument(
                    "tag icons need labelKo or labelEn".into(),
                ));
            }
            AssetKind::QuizBackground if label_ko.is_none() || label_en.is_none() => {
                return Err(AssetError::InvalidArgument(
                    "quiz backgrounds need both labelKo and labelEn".into(),
                ));
            }
            _ => {}
        }
        let storage_path = format!("{}/{}", kind.collection_name(), file_name);
        Ok((file_name, storage_path))
    }

    /// Store the image and its document.
    ///
    /// The document is inserted first so that the unique `storage_path`
    /// index decides which upload owns the blob. A losing upload never
    /// touches the existing image.
    pub async fn upload<S>(
        &self,
        caller: &Caller,
        kind: AssetKind,
        file_name: &str,
        labels: AssetLabels,
        body: S,
    ) -> Result<Asset, AssetError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let (file_name, storage_path) = Self::validate_upload(caller, kind, file_name, &labels)?;

        let label_ko = non_blank(&labels.label_ko);
        let label_en = non_blank(&labels.label_en);
        let slug = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&file_name)
            .to_string();
        let asset = Asset {
            id: Uuid::new_v4().to_string(),
            kind,
            slug,
            file_name: file_name.clone(),
            storage_path,
            label_ko_lowercase: label_ko.as_ref().map(|l| l.to_lowercase()),
            label_en_lowercase: label_en.as_ref().map(|l| l.to_lowercase()),
            label_ko,
            label_en,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO assets (
                id, kind, slug, file_name, storage_path, label_ko, label_en,
                label_ko_lowercase, label_en_lowercase, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&asset.id)
        .bind(kind.collection_name())
        .bind(&asset.slug)
        .bind(&asset.file_name)
        .bind(&asset.storage_path)
        .bind(&asset.label_ko)
        .bind(&asset.label_en)
        .bind(&asset.label_ko_lowercase)
        .bind(&asset.label_en_lowercase)
        .bind(asset.created_at)
        .execute(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                warn!("{} asset {} already exists", kind, asset.storage_path);
                AssetError::AlreadyExists(asset.file_name.clone())
            }
            other => other.into(),
        })?;

        let stored = match self.blobs.put_stream(&asset.storage_path, body).await {
            Ok(stored) => stored,
            Err(err) => {
                // the blob never landed, release the name
                if let Err(cleanup) = sqlx::query("DELETE FROM assets WHERE id = ?")
                    .bind(&asset.id)
                    .execute(&*self.db)
                    .await
                {
                    warn!("could not release asset {}: {}", asset.id, cleanup);
                }
                return Err(err.into());
            }
        };

        info!(
            "stored {} asset {} ({} bytes)",
            kind, asset.storage_path, stored.size_bytes
        );
        Ok(asset)
    }

    pub async fn list(&self, kind: AssetKind) -> Result<Vec<Asset>, AssetError> {
        let assets = sqlx::query_as::<_, Asset>(&format!(
            "{SELECT_ASSETS} WHERE kind = ? ORDER BY created_at DESC, id"
        ))
        .bind(kind.collection_name())
        .fetch_all(&*self.db)
        .await?;
        Ok(assets)
    }

    /// Remove the blob, then the document. A missing blob is accepted.
    pub async fn delete(&self, caller: &Caller, kind: AssetKind, id: &str) -> Result<Asset, AssetError> {
        Self::ensure_admin(caller, "delete assets")?;
        let asset = sqlx::query_as::<_, Asset>(&format!("{SELECT_ASSETS} WHERE kind = ? AND id = ?"))
            .bind(kind.collection_name())
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| AssetError::NotFound {
                kind,
                id: id.to_string(),
            })?;

        self.blobs
            .delete(&asset.storage_path)
            .await
            .map_err(|err| AssetError::StorageDeleteFailed {
                path: asset.storage_path.clone(),
                reason: err.to_string(),
            })?;

        sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        info!("deleted {} asset {}", kind, asset.storage_path);
        Ok(asset)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Last path component with spaces replaced, restricted to image extensions.
fn sanitize_file_name(raw: &str) -> Result<String, AssetError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let extension = cleaned
        .rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty() && !stem.starts_with('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(cleaned),
        _ => Err(AssetError::InvalidArgument(format!(
            "`{}` is not an image file ({})",
            raw,
            IMAGE_EXTENSIONS.join(", ")
        ))),
    }
}
