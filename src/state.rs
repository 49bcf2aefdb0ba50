//! Shared application state handed to every handler.

use crate::{
    auth::TokenSigner,
    config::AppConfig,
    services::{
        admin_service::AdminService,
        archive_service::ArchiveService,
        asset_service::AssetService,
        blob_deleter::{BlobDeleter, LocalBlobDeleter, ProxyBlobDeleter},
        blob_store::BlobStore,
        feedback_service::FeedbackService,
        upload_service::UploadUrlIssuer,
        user_directory::UserDirectory,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub blobs: BlobStore,
    pub tokens: TokenSigner,
    pub uploads: UploadUrlIssuer,
    pub archives: ArchiveService,
    pub admin: AdminService,
    pub users: UserDirectory,
    pub feedback: FeedbackService,
    pub assets: AssetService,
}

impl AppState {
    pub fn new(cfg: &AppConfig, db: Arc<SqlitePool>) -> Self {
        let blobs = BlobStore::new(&cfg.storage_dir);
        let tokens = TokenSigner::new(&cfg.jwt_secret, cfg.jwt_issuer.clone(), cfg.token_ttl);

        let deleter: Arc<dyn BlobDeleter> = match &cfg.delete_proxy_url {
            Some(url) => {
                info!("permanent deletes go through {}", url);
                Arc::new(ProxyBlobDeleter::new(url.clone(), tokens.clone()))
            }
            None => Arc::new(LocalBlobDeleter::new(blobs.clone())),
        };

        Self {
            uploads: UploadUrlIssuer::new(
                &cfg.jwt_secret,
                cfg.public_base_url.clone(),
                cfg.upload_ttl,
            ),
            archives: ArchiveService::new(db.clone(), blobs.clone(), deleter),
            admin: AdminService::new(db.clone()),
            users: UserDirectory::new(db.clone()),
            feedback: FeedbackService::new(db.clone()),
            assets: AssetService::new(db.clone(), blobs.clone()),
            db,
            blobs,
            tokens,
        }
    }
}
