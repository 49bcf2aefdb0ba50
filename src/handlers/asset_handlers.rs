//! Tag icon and quiz background endpoints.

use crate::{
    auth::Caller,
    errors::AppError,
    models::asset::{Asset, AssetKind, AssetLabels},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use bytes::Bytes;
use futures::stream;

fn parse_kind(raw: &str) -> Result<AssetKind, AppError> {
    raw.parse::<AssetKind>().map_err(AppError::invalid_argument)
}

/// `GET /assets/{kind}`
pub async fn list_assets(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Asset>>, AppError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.assets.list(kind).await?))
}

/// `POST /assets/{kind}`: multipart with `file`, `labelKo` and `labelEn`.
pub async fn upload_asset(
    State(state): State<AppState>,
    caller: Caller,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Asset>), AppError> {
    let kind = parse_kind(&kind)?;

    let mut file: Option<(String, Bytes)> = None;
    let mut labels = AssetLabels::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::invalid_argument(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::invalid_argument(err.to_string()))?;
                file = Some((file_name, data));
            }
            "labelKo" | "labelEn" => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| AppError::invalid_argument(err.to_string()))?;
                if name == "labelKo" {
                    labels.label_ko = Some(text);
                } else {
                    labels.label_en = Some(text);
                }
            }
            other => tracing::debug!("ignoring multipart field {}", other),
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::invalid_argument("multipart field `file` is required"))?;
    let asset = state
        .assets
        .upload(
            &caller,
            kind,
            &file_name,
            labels,
            stream::once(async move { Ok(data) }),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// `DELETE /assets/{kind}/{id}`
pub async fn delete_asset(
    State(state): State<AppState>,
    caller: Caller,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Asset>, AppError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.assets.delete(&caller, kind, &id).await?))
}
