//! src/services/blob_store.rs
//!
//! BlobStore: path-addressed object storage on local disk. Payloads are
//! sharded beneath `base_path/{shard}/{shard}/{path}` so that a single
//! directory never collects every archive. Metadata lives elsewhere; this
//! type only knows paths and bytes.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error("invalid blob path `{0}`")]
    InvalidPath(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Result of a completed write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub path: String,
    pub size_bytes: i64,
    /// Hex MD5 of the payload.
    pub etag: String,
}

#[derive(Clone, Debug)]
pub struct BlobStore {
    /// Root directory for all payloads.
    base_path: PathBuf,
}

const MAX_BLOB_PATH_LEN: usize = 1024;

impl BlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Rejects empty, oversized, absolute and `..`-containing paths as well as
    /// control characters and backslashes.
    pub fn ensure_path_safe(path: &str) -> BlobResult<()> {
        let invalid = path.is_empty()
            || path.len() > MAX_BLOB_PATH_LEN
            || path.starts_with('/')
            || path.ends_with('/')
            || path.contains("..")
            || path.contains("//")
            || path
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if invalid {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(())
    }

    /// Two-level shard derived from MD5(path), as lowercase hex bytes.
    fn shards(path: &str) -> (String, String) {
        let digest = md5::compute(path);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Physical location of a blob. Parent directories may not exist yet.
    fn physical_path(&self, path: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(path);
        let mut full = self.base_path.clone();
        full.push(shard_a);
        full.push(shard_b);
        full.push(path);
        full
    }

    /// Stream a payload into `path`, replacing any existing blob.
    ///
    /// Bytes go to a temp file first, get fsynced and are then renamed into
    /// place, so readers never observe a partial blob.
    pub async fn put_stream<S>(&self, path: &str, stream: S) -> BlobResult<StoredBlob>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        Self::ensure_path_safe(path)?;

        let file_path = self.physical_path(path);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobError::Io(io::Error::new(
                ErrorKind::Other,
                "blob path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let (tmp_path, mut file) = Self::create_temp_file(&parent).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(BlobError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobError::Io(err));
            }
        }

        debug!("stored blob {} ({} bytes)", path, size_bytes);
        Ok(StoredBlob {
            path: path.to_string(),
            size_bytes,
            etag: format!("{:x}", digest.compute()),
        })
    }

    /// Create a temp file in `parent`.
    ///
    /// A concurrent delete may prune `parent` after it was created, so a
    /// `NotFound` recreates the directory and tries once more.
    async fn create_temp_file(parent: &Path) -> io::Result<(PathBuf, File)> {
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        match File::create(&tmp_path).await {
            Ok(file) => Ok((tmp_path, file)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("directory {} vanished, recreating", parent.display());
                fs::create_dir_all(parent).await?;
                let file = File::create(&tmp_path).await?;
                Ok((tmp_path, file))
            }
            Err(err) => Err(err),
        }
    }

    pub async fn put_bytes(&self, path: &str, bytes: Bytes) -> BlobResult<StoredBlob> {
        self.put_stream(path, stream::once(async move { Ok(bytes) }))
            .await
    }

    /// Read a whole blob into memory. Quiz payloads are small JSON documents.
    pub async fn read(&self, path: &str) -> BlobResult<Bytes> {
        Self::ensure_path_safe(path)?;
        match fs::read(self.physical_path(path)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(BlobError::NotFound(path.to_string()))
            }
            Err(err) => Err(BlobError::Io(err)),
        }
    }

    pub async fn exists(&self, path: &str) -> BlobResult<bool> {
        Self::ensure_path_safe(path)?;
        Ok(fs::try_exists(self.physical_path(path)).await?)
    }

    /// Remove a blob.
    ///
    /// Returns `Ok(false)` when the blob was already absent, so repeated
    /// deletes of the same path succeed.
    pub async fn delete(&self, path: &str) -> BlobResult<bool> {
        Self::ensure_path_safe(path)?;
        let file_path = self.physical_path(path);
        let existed = match fs::remove_file(&file_path).await {
            Ok(_) => {
                debug!("removed blob file {}", file_path.display());
                true
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("blob file {} already missing", file_path.display());
                false
            }
            Err(err) => return Err(BlobError::Io(err)),
        };

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }

        Ok(existed)
    }

    /// Remove empty directories from `start` up to, but excluding, the base path.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (BlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        (BlobStore::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn test_put_and_read() {
        let (store, _dir) = test_store();
        let stored = store
            .put_bytes("archives/a1.json", Bytes::from_static(b"{\"ok\":true}"))
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 11);
        assert_eq!(stored.etag, format!("{:x}", md5::compute(b"{\"ok\":true}")));

        let bytes = store.read("archives/a1.json").await.unwrap();
        assert_eq!(&bytes[..], b"{\"ok\":true}");
        assert!(store.exists("archives/a1.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (store, _dir) = test_store();
        store
            .put_bytes("archives/a1.json", Bytes::from_static(b"one"))
            .await
            .unwrap();
        store
            .put_bytes("archives/a1.json", Bytes::from_static(b"two"))
            .await
            .unwrap();
        assert_eq!(&store.read("archives/a1.json").await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, dir) = test_store();
        store
            .put_bytes("archives/a1.json", Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert!(store.delete("archives/a1.json").await.unwrap());
        assert!(!store.delete("archives/a1.json").await.unwrap());
        assert!(matches!(
            store.read("archives/a1.json").await,
            Err(BlobError::NotFound(_))
        ));

        // shard directories are pruned back to the root
        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        assert!(entries.next().is_none());
    }

    #[tokio::test]
    async fn test_unsafe_paths_rejected() {
        let (store, _dir) = test_store();
        for path in ["", "/etc/passwd", "archives/../secret", "a\\b", "archives/"] {
            assert!(
                matches!(store.read(path).await, Err(BlobError::InvalidPath(_))),
                "{path:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_temp_file_recreates_pruned_directory() {
        let (store, _dir) = test_store();
        let parent = store.base_path().join("ab").join("cd").join("archives");
        std::fs::create_dir_all(&parent).unwrap();
        std::fs::remove_dir(&parent).unwrap();

        let (tmp_path, _file) = BlobStore::create_temp_file(&parent).await.unwrap();
        assert!(tmp_path.starts_with(&parent));
        assert!(tmp_path.exists());
    }

    #[tokio::test]
    async fn test_put_survives_concurrent_delete_of_same_path() {
        let (store, _dir) = test_store();
        for round in 0..50 {
            let writer = store.clone();
            let deleter = store.clone();
            let put = tokio::spawn(async move {
                writer
                    .put_bytes("archives/a1.json", Bytes::from(format!("round {round}")))
                    .await
            });
            let del = tokio::spawn(async move { deleter.delete("archives/a1.json").await });
            put.await.unwrap().unwrap();
            del.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_nothing() {
        let (store, _dir) = test_store();
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(ErrorKind::ConnectionReset, "client went away")),
        ]);
        assert!(store.put_stream("archives/broken.json", chunks).await.is_err());
        assert!(!store.exists("archives/broken.json").await.unwrap());
    }
}
