//! Liveness and readiness.
//!
//! `/readyz` is what a deployment should gate traffic on: the server does not
//! migrate on boot, so readiness means the metadata schema is in place and the
//! blob root accepts writes.

use crate::{services::blob_store::BlobStore, state::AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

/// Tables every route depends on.
const REQUIRED_TABLES: [&str; 5] = ["archives", "auth_users", "users", "feedback", "assets"];

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReadyResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, Check>,
}

#[derive(Debug, Serialize)]
struct Check {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Result<(), String>> for Check {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Check { ok: true, error: None },
            Err(error) => Check {
                ok: false,
                error: Some(error),
            },
        }
    }
}

/// `GET /healthz`: no I/O.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// `GET /readyz`: 200 when the schema and the blob root are usable, 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (status, body) = readiness(&state.db, &state.blobs).await;
    (status, Json(body))
}

pub(crate) async fn readiness(db: &SqlitePool, blobs: &BlobStore) -> (StatusCode, ReadyResponse) {
    let mut checks = BTreeMap::new();
    checks.insert("schema", Check::from(check_schema(db).await));
    checks.insert("blobRoot", Check::from(check_blob_root(blobs).await));

    let failed: Vec<_> = checks
        .iter()
        .filter(|(_, check)| !check.ok)
        .map(|(name, _)| *name)
        .collect();
    if failed.is_empty() {
        return (StatusCode::OK, ReadyResponse { status: "ok", checks });
    }
    warn!("not ready: {} failing", failed.join(", "));
    (
        StatusCode::SERVICE_UNAVAILABLE,
        ReadyResponse {
            status: "unavailable",
            checks,
        },
    )
}

async fn check_schema(db: &SqlitePool) -> Result<(), String> {
    let present: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(db)
            .await
            .map_err(|err| err.to_string())?;
    let missing: Vec<&str> = REQUIRED_TABLES
        .into_iter()
        .filter(|table| !present.iter().any(|name| name.as_str() == *table))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing tables: {}", missing.join(", ")))
    }
}

/// Write, read back and remove a marker file under the blob root.
async fn check_blob_root(blobs: &BlobStore) -> Result<(), String> {
    let marker = blobs.base_path().join(format!(".readyz-{}", Uuid::new_v4()));
    fs::write(&marker, b"ready")
        .await
        .map_err(|err| format!("write failed: {}", err))?;
    let read_back = fs::read(&marker).await;
    let removed = fs::remove_file(&marker).await;
    match read_back {
        Ok(bytes) if bytes == b"ready" => {}
        Ok(_) => return Err("marker content mismatch".into()),
        Err(err) => return Err(format!("read failed: {}", err)),
    }
    removed.map_err(|err| format!("cleanup failed: {}", err))
}
