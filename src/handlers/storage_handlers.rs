//! Blob-facing handlers: the deletion proxy, signed upload URLs and the
//! upload target itself. Upload bodies are streamed straight to disk.

use crate::{
    auth::Caller,
    errors::AppError,
    services::{
        blob_deleter::authorized_delete,
        upload_service::{SignedUpload, SignedUploadRequest, is_json_content_type},
    },
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::IntoResponse,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteObjectQuery {
    pub file_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteObjectResponse {
    pub file_path: String,
    /// `false` when the blob was already gone.
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub storage_path: String,
    pub size_bytes: i64,
    pub etag: String,
}

/// `DELETE /storage/objects?filePath=...`
pub async fn delete_object(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<DeleteObjectQuery>,
) -> Result<Json<DeleteObjectResponse>, AppError> {
    let deleted = authorized_delete(&state.blobs, &caller, &query.file_path).await?;
    Ok(Json(DeleteObjectResponse {
        file_path: query.file_path,
        deleted,
    }))
}

/// `POST /uploads/signed-url`
pub async fn signed_upload_url(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<SignedUploadRequest>,
) -> Result<Json<SignedUpload>, AppError> {
    Ok(Json(state.uploads.issue(&caller, &request)?))
}

/// `PUT /uploads/{token}`
///
/// The token is the only credential. The request must carry the content type
/// the URL was signed for.
pub async fn upload_blob(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let grant = state.uploads.verify(&token)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !is_json_content_type(content_type) {
        return Err(AppError::invalid_argument(format!(
            "content type `{}` does not match the signed `{}`",
            content_type, grant.content_type
        )));
    }

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));
    let stored = state.blobs.put_stream(&grant.storage_path, stream).await?;
    tracing::info!(
        "upload of {} by {} complete ({} bytes)",
        stored.path,
        grant.uploader_id,
        stored.size_bytes
    );

    let mut resp_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", stored.etag)) {
        resp_headers.insert(header::ETAG, value);
    }
    Ok((
        resp_headers,
        Json(UploadReceipt {
            storage_path: stored.path,
            size_bytes: stored.size_bytes,
            etag: stored.etag,
        }),
    ))
}
