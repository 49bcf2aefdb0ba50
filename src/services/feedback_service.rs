use crate::{
    auth::Caller,
    models::feedback::{Feedback, NewFeedback},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_FEEDBACK_LEN: usize = 4000;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("admin privileges are required to read feedback")]
    PermissionDenied,
    #[error("upstream store unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl From<sqlx::Error> for FeedbackError {
    fn from(err: sqlx::Error) -> Self {
        FeedbackError::UpstreamUnavailable(err.to_string())
    }
}

#[derive(Clone)]
pub struct FeedbackService {
    db: Arc<SqlitePool>,
}

impl FeedbackService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Store a feedback entry. Anonymous submissions carry no user id.
    pub async fn submit(
        &self,
        caller: Option<&Caller>,
        input: NewFeedback,
    ) -> Result<Feedback, FeedbackError> {
        let text = input.text.trim();
        if text.is_empty() {
            return Err(FeedbackError::InvalidArgument("feedback text is required".into()));
        }
        if text.chars().count() > MAX_FEEDBACK_LEN {
            return Err(FeedbackError::InvalidArgument(format!(
                "feedback text exceeds {} characters",
                MAX_FEEDBACK_LEN
            )));
        }

        let feedback = Feedback {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            user_id: caller.map(|c| c.uid.clone()),
            platform: input.platform,
            app_version: input.app_version,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO feedback (id, text, user_id, platform, app_version, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&feedback.id)
        .bind(&feedback.text)
        .bind(&feedback.user_id)
        .bind(&feedback.platform)
        .bind(&feedback.app_version)
        .bind(feedback.created_at)
        .execute(&*self.db)
        .await?;

        info!("feedback {} received", feedback.id);
        Ok(feedback)
    }

    /// Newest first.
    pub async fn list(&self, caller: &Caller) -> Result<Vec<Feedback>, FeedbackError> {
        if !caller.is_admin {
            warn!("feedback listing denied to {}", caller.uid);
            return Err(FeedbackError::PermissionDenied);
        }
        let entries = sqlx::query_as::<_, Feedback>(
            "SELECT id, text, user_id, platform, app_version, created_at FROM feedback ORDER BY created_at DESC, id",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    async fn service() -> (FeedbackService, TempDir) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("meta.db").display());
        let pool = db::connect(&url).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        (FeedbackService::new(Arc::new(pool)), dir)
    }

    fn entry(text: &str) -> NewFeedback {
        NewFeedback {
            text: text.into(),
            platform: "ios".into(),
            app_version: "2.3.1".into(),
        }
    }

    fn caller(is_admin: bool) -> Caller {
        Caller {
            uid: "u1".into(),
            email: None,
            display_name: None,
            is_admin,
        }
    }

    #[tokio::test]
    async fn test_submit_and_list_newest_first() {
        let (service, _dir) = service().await;
        service.submit(None, entry("first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service
            .submit(Some(&caller(false)), entry("  second  "))
            .await
            .unwrap();
        assert_eq!(second.text, "second");
        assert_eq!(second.user_id.as_deref(), Some("u1"));

        let listed = service.list(&caller(true)).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, ["second", "first"]);
        assert!(listed[1].user_id.is_none());
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let (service, _dir) = service().await;
        assert!(matches!(
            service.submit(None, entry("   ")).await,
            Err(FeedbackError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_requires_admin() {
        let (service, _dir) = service().await;
        assert!(matches!(
            service.list(&caller(false)).await,
            Err(FeedbackError::PermissionDenied)
        ));
    }
}
