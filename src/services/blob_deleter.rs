//! Blob deletion used by permanent deletes.
//!
//! Permanent deletes do not remove blobs with the metadata service's own
//! credentials. They go through a deleter: either the local blob store
//! directly (single-node deployments) or the blob-deletion proxy endpoint,
//! authorized with a freshly minted identity token for the calling admin.
//!
//! The local deleter reports an already-absent blob as success. The proxy
//! answers 200 with `deleted: false` for that case, so any non-2xx status,
//! 404 included, is a rejection: a wrong endpoint must never look like a
//! removed blob.

use crate::{
    auth::{Caller, TokenSigner},
    services::blob_store::{BlobError, BlobStore},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Lifetime of the token minted for a single proxy call.
pub const PROXY_TOKEN_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum BlobDeleteError {
    #[error("blob deletion rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("blob deletion request failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Store(#[from] BlobError),
    #[error("admin privileges are required to delete blobs")]
    PermissionDenied,
}

#[async_trait]
pub trait BlobDeleter: Send + Sync {
    /// Remove the blob at `path` on behalf of `caller`.
    async fn delete_blob(&self, path: &str, caller: &Caller) -> Result<(), BlobDeleteError>;
}

/// Deletes straight from the local blob store.
pub struct LocalBlobDeleter {
    blobs: BlobStore,
}

impl LocalBlobDeleter {
    pub fn new(blobs: BlobStore) -> Self {
        Self { blobs }
    }
}

#[async_trait]
impl BlobDeleter for LocalBlobDeleter {
    async fn delete_blob(&self, path: &str, caller: &Caller) -> Result<(), BlobDeleteError> {
        let existed = self.blobs.delete(path).await?;
        debug!(
            "local blob delete of {} for {} (existed: {})",
            path, caller.uid, existed
        );
        Ok(())
    }
}

/// Server side of the blob-deletion proxy.
///
/// Returns whether the blob existed; a missing blob is not an error.
pub async fn authorized_delete(
    blobs: &BlobStore,
    caller: &Caller,
    path: &str,
) -> Result<bool, BlobDeleteError> {
    if !caller.is_admin {
        warn!("blob delete of {} denied to non-admin {}", path, caller.uid);
        return Err(BlobDeleteError::PermissionDenied);
    }
    Ok(blobs.delete(path).await?)
}

/// Calls `DELETE {endpoint}?filePath=<path>` with a bearer identity token.
pub struct ProxyBlobDeleter {
    client: reqwest::Client,
    endpoint: String,
    tokens: TokenSigner,
}

#[derive(Deserialize)]
struct ProxyErrorBody {
    #[serde(alias = "message")]
    error: Option<String>,
}

impl ProxyBlobDeleter {
    pub fn new(endpoint: impl Into<String>, tokens: TokenSigner) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            tokens,
        }
    }
}

#[async_trait]
impl BlobDeleter for ProxyBlobDeleter {
    async fn delete_blob(&self, path: &str, caller: &Caller) -> Result<(), BlobDeleteError> {
        let token = self
            .tokens
            .issue_with_ttl(caller, PROXY_TOKEN_TTL)
            .map_err(|err| BlobDeleteError::Transport(err.to_string()))?;

        let response = self
            .client
            .delete(&self.endpoint)
            .query(&[("filePath", path)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| BlobDeleteError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("proxy deleted blob {} ({})", path, status);
            return Ok(());
        }
        let message = response
            .json::<ProxyErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| "blob deletion failed".to_string());
        warn!("proxy refused to delete {}: {} {}", path, status, message);
        Err(BlobDeleteError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
