//! Admin-claim management: grant, revoke, list.
//!
//! Admin state lives in two places. The custom claim in the identity
//! directory is what gets minted into tokens and what every privileged
//! operation trusts. The `isAdmin` flag on the profile document mirrors it
//! for display. Grant and revoke update both in one transaction; anything
//! that writes only the claim produces drift, which `list_admins` reports.

use crate::{
    auth::Caller,
    models::user::{AdminMessage, AdminUser, UserProfile},
    services::user_directory,
};
use chrono::Utc;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("admin privileges are required to {0}")]
    PermissionDenied(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("upstream store unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl From<sqlx::Error> for AdminError {
    fn from(err: sqlx::Error) -> Self {
        AdminError::UpstreamUnavailable(err.to_string())
    }
}

#[derive(FromRow)]
struct AdminRow {
    uid: String,
    email: Option<String>,
    profile_is_admin: Option<bool>,
}

#[derive(Clone)]
pub struct AdminService {
    db: Arc<SqlitePool>,
}

impl AdminService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    fn ensure_admin(caller: &Caller, action: &'static str) -> Result<(), AdminError> {
        if !caller.is_admin {
            warn!("{} denied to non-admin {}", action, caller.uid);
            return Err(AdminError::PermissionDenied(action));
        }
        Ok(())
    }

    pub async fn grant_admin(&self, caller: &Caller, email: &str) -> Result<AdminMessage, AdminError> {
        Self::ensure_admin(caller, "grant admin")?;
        let email = email.trim();
        if email.is_empty() {
            return Err(AdminError::InvalidArgument("email is required".into()));
        }

        let mut tx = self.db.begin().await?;
        let account = user_directory::find_by_email(&mut tx, email)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("no user with email {}", email)))?;
        user_directory::set_admin_claim(&mut tx, &account.uid, true).await?;
        merge_profile_flag(
            &mut tx,
            &account.uid,
            account.email.as_deref(),
            account.display_name.as_deref(),
            true,
        )
        .await?;
        tx.commit().await?;

        info!("{} granted admin to {} ({})", caller.uid, account.uid, email);
        Ok(AdminMessage {
            message: format!("{} is now an admin", email),
        })
    }

    pub async fn revoke_admin(&self, caller: &Caller, uid: &str) -> Result<AdminMessage, AdminError> {
        Self::ensure_admin(caller, "revoke admin")?;
        let uid = uid.trim();
        if uid.is_empty() {
            return Err(AdminError::InvalidArgument("uid is required".into()));
        }

        let mut tx = self.db.begin().await?;
        let account = user_directory::find_by_uid(&mut tx, uid)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("no user with uid {}", uid)))?;
        user_directory::set_admin_claim(&mut tx, uid, false).await?;
        merge_profile_flag(
            &mut tx,
            uid,
            account.email.as_deref(),
            account.display_name.as_deref(),
            false,
        )
        .await?;
        tx.commit().await?;

        info!("{} revoked admin from {}", caller.uid, uid);
        Ok(AdminMessage {
            message: format!("admin revoked from {}", uid),
        })
    }

    /// Every account holding the claim, next to its profile flag.
    ///
    /// A missing profile reads as `firestoreIsAdmin: false`.
    pub async fn list_admins(&self, caller: &Caller) -> Result<Vec<AdminUser>, AdminError> {
        Self::ensure_admin(caller, "list admins")?;
        let rows = sqlx::query_as::<_, AdminRow>(
            r#"
            SELECT a.uid, a.email, u.is_admin AS profile_is_admin
            FROM auth_users a
            LEFT JOIN users u ON u.uid = a.uid
            WHERE a.admin_claim = 1
            ORDER BY a.uid
            "#,
        )
        .fetch_all(&*self.db)
        .await?;

        let admins: Vec<AdminUser> = rows
            .into_iter()
            .map(|row| AdminUser {
                uid: row.uid,
                email: row.email,
                token_is_admin: true,
                firestore_is_admin: row.profile_is_admin.unwrap_or(false),
            })
            .collect();
        let drifted = admins.iter().filter(|a| !a.firestore_is_admin).count();
        if drifted > 0 {
            warn!("{} admin(s) missing the profile flag", drifted);
        }
        Ok(admins)
    }

    /// Create the caller's profile document if it does not exist yet.
    ///
    /// New profiles start with `isAdmin: false` whatever the claim says.
    pub async fn ensure_profile(&self, caller: &Caller) -> Result<UserProfile, AdminError> {
        sqlx::query(
            r#"
            INSERT INTO users (uid, email, display_name, photo_url, is_admin, created_at)
            VALUES (?, ?, ?, NULL, 0, ?)
            ON CONFLICT(uid) DO NOTHING
            "#,
        )
        .bind(&caller.uid)
        .bind(&caller.email)
        .bind(&caller.display_name)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        sqlx::query_as::<_, UserProfile>(
            "SELECT uid, email, display_name, photo_url, is_admin, created_at FROM users WHERE uid = ?",
        )
        .bind(&caller.uid)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| AdminError::NotFound(format!("profile {} vanished", caller.uid)))
    }
}

async fn merge_profile_flag(
    conn: &mut SqliteConnection,
    uid: &str,
    email: Option<&str>,
    display_name: Option<&str>,
    is_admin: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (uid, email, display_name, photo_url, is_admin, created_at)
        VALUES (?, ?, ?, NULL, ?, ?)
        ON CONFLICT(uid) DO UPDATE SET is_admin = excluded.is_admin
        "#,
    )
    .bind(uid)
    .bind(email)
    .bind(display_name)
    .bind(is_admin)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, services::user_directory::UserDirectory};
    use tempfile::TempDir;

    struct Harness {
        admin: AdminService,
        users: UserDirectory,
        _dir: TempDir,
    }

    async fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("meta.db").display());
        let pool = Arc::new(db::connect(&url).await.unwrap());
        db::run_migrations(&pool).await.unwrap();
        Harness {
            admin: AdminService::new(pool.clone()),
            users: UserDirectory::new(pool),
            _dir: dir,
        }
    }

    fn caller(uid: &str, is_admin: bool) -> Caller {
        Caller {
            uid: uid.into(),
            email: Some(format!("{uid}@example.com")),
            display_name: None,
            is_admin,
        }
    }

    #[tokio::test]
    async fn test_non_admin_grant_changes_nothing() {
        let h = harness().await;
        h.users
            .upsert_account("target", Some("user@example.com"), None)
            .await
            .unwrap();

        let err = h
            .admin
            .grant_admin(&caller("mallory", false), "user@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::PermissionDenied(_)));

        let account = h.users.find_by_uid("target").await.unwrap().unwrap();
        assert!(!account.admin_claim);
        let admins = h.admin.list_admins(&caller("root", true)).await.unwrap();
        assert!(admins.is_empty());
    }

    #[tokio::test]
    async fn test_grant_then_revoke() {
        let h = harness().await;
        h.users
            .upsert_account("target", Some("user@example.com"), None)
            .await
            .unwrap();
        let root = caller("root", true);

        let reply = h.admin.grant_admin(&root, "user@example.com").await.unwrap();
        assert!(reply.message.contains("user@example.com"));
        assert_eq!(
            h.admin.list_admins(&root).await.unwrap(),
            vec![AdminUser {
                uid: "target".into(),
                email: Some("user@example.com".into()),
                token_is_admin: true,
                firestore_is_admin: true,
            }]
        );

        h.admin.revoke_admin(&root, "target").await.unwrap();
        assert!(h.admin.list_admins(&root).await.unwrap().is_empty());
        assert!(!h.users.find_by_uid("target").await.unwrap().unwrap().admin_claim);
    }

    #[tokio::test]
    async fn test_claim_only_admin_is_reported_as_drift() {
        let h = harness().await;
        h.users
            .upsert_account("cli-made", Some("ops@example.com"), None)
            .await
            .unwrap();
        h.users.set_admin_claim("cli-made", true).await.unwrap();

        let admins = h.admin.list_admins(&caller("root", true)).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert!(admins[0].token_is_admin);
        assert!(!admins[0].firestore_is_admin);
    }

    #[tokio::test]
    async fn test_argument_and_lookup_errors() {
        let h = harness().await;
        let root = caller("root", true);
        assert!(matches!(
            h.admin.grant_admin(&root, "  ").await,
            Err(AdminError::InvalidArgument(_))
        ));
        assert!(matches!(
            h.admin.grant_admin(&root, "nobody@example.com").await,
            Err(AdminError::NotFound(_))
        ));
        assert!(matches!(
            h.admin.revoke_admin(&root, "").await,
            Err(AdminError::InvalidArgument(_))
        ));
        assert!(matches!(
            h.admin.revoke_admin(&root, "ghost").await,
            Err(AdminError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_profile_is_idempotent_and_not_admin() {
        let h = harness().await;
        let who = caller("alice", true);
        let first = h.admin.ensure_profile(&who).await.unwrap();
        assert!(!first.is_admin);
        let second = h.admin.ensure_profile(&who).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
    }
}
