//! HTTP handlers for archive records and their lifecycle transitions.
//! Authorization is decided by `ArchiveService` from the verified caller.

use crate::{
    auth::Caller,
    errors::AppError,
    models::{
        archive::{ArchiveRecord, ArchiveTransition, CreateArchive, PermanentDeletion},
        bucket::ArchiveBucket,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

fn parse_bucket(raw: &str) -> Result<ArchiveBucket, AppError> {
    Ok(raw.parse::<ArchiveBucket>()?)
}

/// `POST /archives`
pub async fn create_archive(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateArchive>,
) -> Result<(StatusCode, Json<ArchiveRecord>), AppError> {
    let record = state.archives.create(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /archives/{bucket}`
pub async fn list_archives(
    State(state): State<AppState>,
    caller: Option<Caller>,
    Path(bucket): Path<String>,
) -> Result<Json<Vec<ArchiveRecord>>, AppError> {
    let bucket = parse_bucket(&bucket)?;
    let records = state.archives.list(caller.as_ref(), bucket).await?;
    Ok(Json(records))
}

/// `GET /archives/{bucket}/{id}`
pub async fn get_archive(
    State(state): State<AppState>,
    caller: Option<Caller>,
    Path((bucket, id)): Path<(String, String)>,
) -> Result<Json<ArchiveRecord>, AppError> {
    let bucket = parse_bucket(&bucket)?;
    let record = state.archives.get(caller.as_ref(), bucket, &id).await?;
    Ok(Json(record))
}

/// `GET /archives/{bucket}/{id}/content`
///
/// Serves the quiz JSON as an attachment named after the record title.
pub async fn archive_content(
    State(state): State<AppState>,
    caller: Option<Caller>,
    Path((bucket, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let bucket = parse_bucket(&bucket)?;
    let (record, bytes) = state.archives.content(caller.as_ref(), bucket, &id).await?;

    let file_name: String = record
        .title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let file_name = match file_name.trim() {
        "" => record.id.clone(),
        name => name.to_string(),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.json\"", file_name),
            ),
        ],
        bytes,
    ))
}

/// `POST /archives/{bucket}/{id}/move`
pub async fn move_archive(
    State(state): State<AppState>,
    caller: Caller,
    Path((bucket, id)): Path<(String, String)>,
) -> Result<Json<ArchiveTransition>, AppError> {
    let bucket = parse_bucket(&bucket)?;
    Ok(Json(state.archives.move_record(&caller, bucket, &id).await?))
}

/// `POST /archives/{bucket}/{id}/delete`
pub async fn soft_delete_archive(
    State(state): State<AppState>,
    caller: Caller,
    Path((bucket, id)): Path<(String, String)>,
) -> Result<Json<ArchiveTransition>, AppError> {
    let bucket = parse_bucket(&bucket)?;
    Ok(Json(state.archives.soft_delete(&caller, bucket, &id).await?))
}

/// `POST /archives/{bucket}/{id}/restore`
pub async fn restore_archive(
    State(state): State<AppState>,
    caller: Caller,
    Path((bucket, id)): Path<(String, String)>,
) -> Result<Json<ArchiveTransition>, AppError> {
    let bucket = parse_bucket(&bucket)?;
    Ok(Json(state.archives.restore(&caller, bucket, &id).await?))
}

/// `DELETE /archives/{bucket}/{id}`
pub async fn permanent_delete_archive(
    State(state): State<AppState>,
    caller: Caller,
    Path((bucket, id)): Path<(String, String)>,
) -> Result<Json<PermanentDeletion>, AppError> {
    let bucket = parse_bucket(&bucket)?;
    Ok(Json(
        state.archives.permanent_delete(&caller, bucket, &id).await?,
    ))
}
