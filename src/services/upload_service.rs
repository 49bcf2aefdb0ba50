//! Signed upload URLs.
//!
//! A caller asks for an upload URL, then PUTs the quiz JSON straight to it.
//! The URL embeds a short-lived token scoped to one blob path and content
//! type, so the upload itself needs no identity token.

use crate::auth::Caller;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const UPLOAD_AUDIENCE: &str = "upload";
const ARCHIVE_CONTENT_TYPE: &str = "application/json";
const MAX_STEM_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid upload request: {0}")]
    InvalidArgument(String),
    #[error("upload URL rejected: {0}")]
    InvalidToken(String),
    #[error("failed to sign upload URL: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUploadRequest {
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpload {
    pub upload_url: String,
    pub storage_path: String,
}

/// What a verified upload URL allows.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadGrant {
    pub storage_path: String,
    pub content_type: String,
    pub uploader_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct UploadClaims {
    path: String,
    content_type: String,
    sub: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Clone)]
pub struct UploadUrlIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_base_url: String,
    ttl: Duration,
}

impl UploadUrlIssuer {
    pub fn new(secret: &str, public_base_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            ttl,
        }
    }

    /// Reserve a fresh `archives/<generated>.json` path and sign a URL for it.
    pub fn issue(
        &self,
        caller: &Caller,
        request: &SignedUploadRequest,
    ) -> Result<SignedUpload, UploadError> {
        if request.file_name.trim().is_empty() {
            return Err(UploadError::InvalidArgument("fileName is required".into()));
        }
        if !is_json_content_type(&request.content_type) {
            return Err(UploadError::InvalidArgument(format!(
                "content type `{}` is not accepted, expected {}",
                request.content_type, ARCHIVE_CONTENT_TYPE
            )));
        }

        let storage_path = format!(
            "archives/{}_{}.json",
            Uuid::new_v4().simple(),
            sanitize_stem(&request.file_name)
        );
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = UploadClaims {
            path: storage_path.clone(),
            content_type: ARCHIVE_CONTENT_TYPE.to_string(),
            sub: caller.uid.clone(),
            aud: UPLOAD_AUDIENCE.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| UploadError::Signing(err.to_string()))?;

        debug!("issued upload URL for {} to {}", storage_path, caller.uid);
        Ok(SignedUpload {
            upload_url: format!("{}/uploads/{}", self.public_base_url, token),
            storage_path,
        })
    }

    /// Check an upload token taken from the URL path.
    pub fn verify(&self, token: &str) -> Result<UploadGrant, UploadError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[UPLOAD_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "aud", "sub"]);

        let claims = decode::<UploadClaims>(token, &self.decoding_key, &validation)
            .map_err(|err| UploadError::InvalidToken(err.to_string()))?
            .claims;
        Ok(UploadGrant {
            storage_path: claims.path,
            content_type: claims.content_type,
            uploader_id: claims.sub,
        })
    }
}

/// Accepts `application/json` with optional parameters such as a charset.
pub fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case(ARCHIVE_CONTENT_TYPE))
        .unwrap_or(false)
}

/// File stem reduced to `[A-Za-z0-9_-]`, truncated, never empty.
fn sanitize_stem(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let cleaned: String = stem
        .chars()
        .map(|c| if c == ' ' || c == '.' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_STEM_LEN)
        .collect();
    if cleaned.is_empty() {
        "archive".to_string()
    } else {
        cleaned
    }
}
