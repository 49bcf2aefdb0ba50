use crate::{
    auth::AuthError,
    models::bucket::UnknownBucket,
    services::{
        admin_service::AdminError, archive_service::LifecycleError, asset_service::AssetError,
        blob_deleter::BlobDeleteError, blob_store::BlobError, feedback_service::FeedbackError,
        upload_service::UploadError,
    },
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// HTTP-facing error: a status, a stable machine-readable code and a message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not-found", msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid-argument", msg)
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "permission-denied", msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "upstream-unavailable", msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "code": self.code,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<UnknownBucket> for AppError {
    fn from(err: UnknownBucket) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "invalid-bucket", err.to_string())
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        let message = err.to_string();
        match err {
            LifecycleError::NotFound { .. } => AppError::not_found(message),
            LifecycleError::InvalidTransition { .. } => {
                AppError::new(StatusCode::CONFLICT, "invalid-transition", message)
            }
            LifecycleError::InvalidArchive(_) => AppError::invalid_argument(message),
            LifecycleError::StorageDeleteFailed { .. } => {
                AppError::new(StatusCode::BAD_GATEWAY, "storage-delete-failed", message)
            }
            LifecycleError::MetadataDeleteFailedAfterBlobRemoved { .. } => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "metadata-delete-failed-after-blob-removed",
                message,
            ),
            LifecycleError::PermissionDenied(_) => AppError::permission_denied(message),
            LifecycleError::UpstreamUnavailable(_) => AppError::unavailable(message),
        }
    }
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        let message = err.to_string();
        match err {
            AdminError::PermissionDenied(_) => AppError::permission_denied(message),
            AdminError::InvalidArgument(_) => AppError::invalid_argument(message),
            AdminError::NotFound(_) => AppError::not_found(message),
            AdminError::UpstreamUnavailable(_) => AppError::unavailable(message),
        }
    }
}

impl From<AssetError> for AppError {
    fn from(err: AssetError) -> Self {
        let message = err.to_string();
        match err {
            AssetError::InvalidArgument(_) => AppError::invalid_argument(message),
            AssetError::NotFound { .. } => AppError::not_found(message),
            AssetError::AlreadyExists(_) => {
                AppError::new(StatusCode::CONFLICT, "already-exists", message)
            }
            AssetError::PermissionDenied(_) => AppError::permission_denied(message),
            AssetError::StorageDeleteFailed { .. } => {
                AppError::new(StatusCode::BAD_GATEWAY, "storage-delete-failed", message)
            }
            AssetError::UpstreamUnavailable(_) => AppError::unavailable(message),
        }
    }
}

impl From<FeedbackError> for AppError {
    fn from(err: FeedbackError) -> Self {
        let message = err.to_string();
        match err {
            FeedbackError::InvalidArgument(_) => AppError::invalid_argument(message),
            FeedbackError::PermissionDenied => AppError::permission_denied(message),
            FeedbackError::UpstreamUnavailable(_) => AppError::unavailable(message),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let message = err.to_string();
        match err {
            UploadError::InvalidArgument(_) => AppError::invalid_argument(message),
            UploadError::InvalidToken(_) => AppError::permission_denied(message),
            UploadError::Signing(_) => AppError::internal(message),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::MissingToken | AuthError::InvalidToken(_) => {
                AppError::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
            }
            AuthError::Signing(_) => AppError::internal(message),
        }
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        let message = err.to_string();
        match err {
            BlobError::NotFound(_) => AppError::not_found(message),
            BlobError::InvalidPath(_) => AppError::invalid_argument(message),
            BlobError::Io(_) => AppError::internal(message),
        }
    }
}

impl From<BlobDeleteError> for AppError {
    fn from(err: BlobDeleteError) -> Self {
        match err {
            BlobDeleteError::Store(inner) => inner.into(),
            BlobDeleteError::PermissionDenied => AppError::permission_denied(err.to_string()),
            other => AppError::new(
                StatusCode::BAD_GATEWAY,
                "storage-delete-failed",
                other.to_string(),
            ),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bucket::ArchiveBucket;

    #[test]
    fn test_lifecycle_codes() {
        let err: AppError = LifecycleError::InvalidTransition {
            operation: "restore",
            bucket: ArchiveBucket::Official,
        }
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "invalid-transition");

        let err: AppError = LifecycleError::MetadataDeleteFailedAfterBlobRemoved {
            bucket: ArchiveBucket::DeletedCommunity,
            id: "a1".into(),
            path: "archives/a1.json".into(),
            reason: "pool closed".into(),
        }
        .into();
        assert_eq!(err.code, "metadata-delete-failed-after-blob-removed");
        assert!(err.message.contains("archives/a1.json"));
    }

    #[test]
    fn test_auth_errors_are_401() {
        let err: AppError = AuthError::MissingToken.into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "unauthenticated");
    }
}
