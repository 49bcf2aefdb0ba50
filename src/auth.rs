//! Identity tokens.
//!
//! Callers present an HS256 JWT in `Authorization: Bearer <token>`. The
//! payload carries the uid, contact details and the custom `isAdmin` claim:
//!
//! ```json
//! {
//!   "sub": "o0mPFgbNLsVlkHgpaA45NXccPyq2",
//!   "email": "user@example.com",
//!   "name": "Quiz Admin",
//!   "isAdmin": true,
//!   "iss": "archive-store",
//!   "iat": 1735603200,
//!   "exp": 1735606800
//! }
//! ```
//!
//! Tokens are verified here, on the server. Whether a caller may perform a
//! privileged operation is decided by the services from the verified claim,
//! never from anything the client reports about itself.

use crate::{errors::AppError, state::AppState};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Allowed clock skew when checking `exp`.
const LEEWAY_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid identity token: {0}")]
    InvalidToken(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (uid).
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Custom admin claim.
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,

    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_admin: bool,
}

impl Caller {
    /// Label recorded as `uploader`: display name, then email, then uid.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| self.email.clone().filter(|email| !email.is_empty()))
            .unwrap_or_else(|| self.uid.clone())
    }
}

/// Issues and verifies identity tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token with the default lifetime.
    pub fn issue(&self, caller: &Caller) -> Result<String, AuthError> {
        self.issue_with_ttl(caller, self.ttl)
    }

    /// Issue a token that expires after `ttl`.
    pub fn issue_with_ttl(&self, caller: &Caller, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = IdentityClaims {
            sub: caller.uid.clone(),
            email: caller.email.clone(),
            name: caller.display_name.clone(),
            is_admin: caller.is_admin,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl.as_secs(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &IdentityClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    /// Verify signature, issuer and expiry and return the caller.
    pub fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<IdentityClaims>(token, &self.decoding_key, &validation)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?;
        let claims = data.claims;
        Ok(Caller {
            uid: claims.sub,
            email: claims.email,
            display_name: claims.name,
            is_admin: claims.is_admin,
        })
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("authorization header is not ASCII".into()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AuthError::InvalidToken(
            "expected `Authorization: Bearer <token>`".into(),
        )),
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or(AuthError::MissingToken)?;
        Ok(state.tokens.verify(token)?)
    }
}

/// Routes that also serve anonymous callers take `Option<Caller>`: no header
/// means `None`, a bad token is still rejected.
impl OptionalFromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(Some(state.tokens.verify(token)?)),
            None => Ok(None),
        }
    }
}
