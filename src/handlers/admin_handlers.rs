//! Admin-claim management and the caller's own account.

use crate::{
    auth::Caller,
    errors::AppError,
    models::user::{AdminMessage, AdminUser, UserProfile},
    state::AppState,
};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct GrantAdminRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RevokeAdminRequest {
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedToken {
    pub token: String,
    pub expires_in: u64,
    pub is_admin: bool,
}

/// `POST /admin/claims/grant`
pub async fn grant_admin(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<GrantAdminRequest>,
) -> Result<Json<AdminMessage>, AppError> {
    Ok(Json(state.admin.grant_admin(&caller, &request.email).await?))
}

/// `POST /admin/claims/revoke`
pub async fn revoke_admin(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<RevokeAdminRequest>,
) -> Result<Json<AdminMessage>, AppError> {
    Ok(Json(state.admin.revoke_admin(&caller, &request.uid).await?))
}

/// `GET /admin/claims`
pub async fn list_admins(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<AdminUser>>, AppError> {
    Ok(Json(state.admin.list_admins(&caller).await?))
}

/// `POST /auth/token/refresh`
///
/// Re-mints the caller's token from the directory, so a granted or revoked
/// claim takes effect without waiting for the old token to expire.
pub async fn refresh_token(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<RefreshedToken>, AppError> {
    let account = state
        .users
        .upsert_account(
            &caller.uid,
            caller.email.as_deref(),
            caller.display_name.as_deref(),
        )
        .await?;
    let refreshed = Caller {
        uid: account.uid,
        email: account.email,
        display_name: account.display_name,
        is_admin: account.admin_claim,
    };
    let token = state.tokens.issue(&refreshed)?;
    Ok(Json(RefreshedToken {
        token,
        expires_in: state.tokens.ttl().as_secs(),
        is_admin: refreshed.is_admin,
    }))
}

/// `POST /me/profile`
pub async fn ensure_profile(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<UserProfile>, AppError> {
    state
        .users
        .upsert_account(
            &caller.uid,
            caller.email.as_deref(),
            caller.display_name.as_deref(),
        )
        .await?;
    Ok(Json(state.admin.ensure_profile(&caller).await?))
}
