//! Defines routes for the archive lifecycle, blob and admin operations.
//!
//! ## Structure
//! - **Archive endpoints**
//!   - `POST   /archives`: register an uploaded quiz blob
//!   - `GET    /archives/{bucket}`: list one collection
//!   - `GET    /archives/{bucket}/{id}`: fetch one record
//!   - `GET    /archives/{bucket}/{id}/content`: download the quiz JSON
//!   - `POST   /archives/{bucket}/{id}/move`: move between live buckets, or restore
//!   - `POST   /archives/{bucket}/{id}/delete`: soft delete
//!   - `POST   /archives/{bucket}/{id}/restore`: restore
//!   - `DELETE /archives/{bucket}/{id}`: permanent delete (blob, then metadata)
//!
//! - **Blob endpoints**
//!   - `DELETE /storage/objects?filePath=`: blob-deletion proxy
//!   - `POST   /uploads/signed-url`: issue a signed upload URL
//!   - `PUT    /uploads/{token}`: upload through a signed URL
//!
//! - **Admin, account, feedback and asset endpoints**
//!
//! `{bucket}` is a collection name such as `communityArchives`.

use crate::{
    handlers::{
        admin_handlers::{ensure_profile, grant_admin, list_admins, refresh_token, revoke_admin},
        archive_handlers::{
            archive_content, create_archive, get_archive, list_archives, move_archive,
            permanent_delete_archive, restore_archive, soft_delete_archive,
        },
        asset_handlers::{delete_asset, list_assets, upload_asset},
        feedback_handlers::{list_feedback, submit_feedback},
        health_handlers::{healthz, readyz},
        storage_handlers::{delete_object, signed_upload_url, upload_blob},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Asset images are buffered in memory before they hit the blob store.
const MAX_ASSET_BYTES: usize = 10 * 1024 * 1024;

/// Build and return the router for all endpoints.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // identity
        .route("/auth/token/refresh", post(refresh_token))
        .route("/me/profile", post(ensure_profile))
        // archives
        .route("/archives", post(create_archive))
        .route("/archives/{bucket}", get(list_archives))
        .route(
            "/archives/{bucket}/{id}",
            get(get_archive).delete(permanent_delete_archive),
        )
        .route("/archives/{bucket}/{id}/content", get(archive_content))
        .route("/archives/{bucket}/{id}/move", post(move_archive))
        .route("/archives/{bucket}/{id}/delete", post(soft_delete_archive))
        .route("/archives/{bucket}/{id}/restore", post(restore_archive))
        // blobs
        .route("/storage/objects", delete(delete_object))
        .route("/uploads/signed-url", post(signed_upload_url))
        .route("/uploads/{token}", put(upload_blob))
        // admin claims
        .route("/admin/claims", get(list_admins))
        .route("/admin/claims/grant", post(grant_admin))
        .route("/admin/claims/revoke", post(revoke_admin))
        // feedback
        .route("/feedback", get(list_feedback).post(submit_feedback))
        // assets
        .route(
            "/assets/{kind}",
            get(list_assets)
                .post(upload_asset)
                .layer(DefaultBodyLimit::max(MAX_ASSET_BYTES)),
        )
        .route("/assets/{kind}/{id}", delete(delete_asset))
}
