//! Identity directory: accounts and their custom admin claim.
//!
//! The claim stored here is what `/auth/token/refresh` mints into new identity
//! tokens. Profile documents live in `users` and are handled by the admin
//! service.

use crate::models::user::UserAccount;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct UserDirectory {
    db: Arc<SqlitePool>,
}

const ACCOUNT_COLUMNS: &str = "SELECT uid, email, display_name, admin_claim, created_at FROM auth_users";

impl UserDirectory {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert the account or refresh its contact details. The claim is kept.
    pub async fn upsert_account(
        &self,
        uid: &str,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<UserAccount, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO auth_users (uid, email, display_name, admin_claim, created_at)
            VALUES (?, ?, ?, 0, ?)
            ON CONFLICT(uid) DO UPDATE SET
                email = COALESCE(excluded.email, auth_users.email),
                display_name = COALESCE(excluded.display_name, auth_users.display_name)
            "#,
        )
        .bind(uid)
        .bind(email)
        .bind(display_name)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        debug!("directory entry {} up to date", uid);
        self.find_by_uid(uid).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_uid(&self, uid: &str) -> Result<Option<UserAccount>, sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        find_by_uid(&mut conn, uid).await
    }

    /// Write only the claim. Returns `false` when the uid is unknown.
    pub async fn set_admin_claim(&self, uid: &str, is_admin: bool) -> Result<bool, sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        let updated = set_admin_claim(&mut conn, uid, is_admin).await?;
        if updated {
            info!("custom claim isAdmin={} set for {}", is_admin, uid);
        }
        Ok(updated)
    }
}

pub(crate) async fn find_by_uid(
    conn: &mut SqliteConnection,
    uid: &str,
) -> Result<Option<UserAccount>, sqlx::Error> {
    sqlx::query_as::<_, UserAccount>(&format!("{ACCOUNT_COLUMNS} WHERE uid = ?"))
        .bind(uid)
        .fetch_optional(&mut *conn)
        .await
}

pub(crate) async fn find_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<UserAccount>, sqlx::Error> {
    sqlx::query_as::<_, UserAccount>(&format!(
        "{ACCOUNT_COLUMNS} WHERE email = ? COLLATE NOCASE"
    ))
    .bind(email)
    .fetch_optional(&mut *conn)
    .await
}

pub(crate) async fn set_admin_claim(
    conn: &mut SqliteConnection,
    uid: &str,
    is_admin: bool,
) -> Result<bool, sqlx::Error> {
    let done = sqlx::query("UPDATE auth_users SET admin_claim = ? WHERE uid = ?")
        .bind(is_admin)
        .bind(uid)
        .execute(&mut *conn)
        .await?;
    Ok(done.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    async fn directory() -> (UserDirectory, Arc<SqlitePool>, TempDir) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("meta.db").display());
        let pool = Arc::new(db::connect(&url).await.unwrap());
        db::run_migrations(&pool).await.unwrap();
        (UserDirectory::new(pool.clone()), pool, dir)
    }

    #[tokio::test]
    async fn test_upsert_keeps_claim() {
        let (users, _pool, _dir) = directory().await;
        users
            .upsert_account("u1", Some("user@example.com"), None)
            .await
            .unwrap();
        assert!(users.set_admin_claim("u1", true).await.unwrap());

        let account = users
            .upsert_account("u1", None, Some("User One"))
            .await
            .unwrap();
        assert!(account.admin_claim);
        assert_eq!(account.email.as_deref(), Some("user@example.com"));
        assert_eq!(account.display_name.as_deref(), Some("User One"));
    }

    #[tokio::test]
    async fn test_lookup_by_email_ignores_case() {
        let (users, pool, _dir) = directory().await;
        users
            .upsert_account("u1", Some("User@Example.com"), None)
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let found = find_by_email(&mut conn, "user@example.com").await.unwrap();
        assert_eq!(found.map(|a| a.uid).as_deref(), Some("u1"));
        assert!(find_by_email(&mut conn, "nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_claim_on_unknown_uid() {
        let (users, _pool, _dir) = directory().await;
        assert!(!users.set_admin_claim("ghost", true).await.unwrap());
        assert!(users.find_by_uid("ghost").await.unwrap().is_none());
    }
}
