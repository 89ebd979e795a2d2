use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    access::{ELEVATED_ROLE, normalize_name},
    config::{AppConfig, Env},
    error::ApiError,
    models::Post,
};

/// Claims
///
/// Payload expected inside the bearer tokens minted by the external identity
/// service. This crate only verifies and reads them; it never issues tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the caller, matched against `Post::author` for ownership.
    pub username: String,
    /// Role codes held by the caller. Code `0` is the elevated role.
    #[serde(default)]
    pub role: Vec<i32>,
    /// Expiration Time (exp): tokens past this instant are rejected.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
    pub role: Vec<i32>,
}

impl AuthUser {
    pub fn is_elevated(&self) -> bool {
        self.role.contains(&ELEVATED_ROLE)
    }

    /// Case-insensitive, whitespace-trimmed comparison against the post author.
    pub fn owns(&self, post: &Post) -> bool {
        normalize_name(&post.author) == normalize_name(&self.username)
    }
}

/// MaybeUser
///
/// Optional caller context. Every post endpoint accepts anonymous callers, so the
/// extractor yields `MaybeUser(None)` when no credentials are sent. Credentials
/// that are sent but fail verification are rejected with 401 rather than being
/// silently downgraded to anonymous.
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        // Local development bypass: identity straight from headers.
        if config.env == Env::Local {
            if let Some(user) = user_from_dev_headers(&parts.headers) {
                return Ok(MaybeUser(Some(user)));
            }
        }

        let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(MaybeUser(None));
        };

        let token = auth_header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::InvalidToken)?;

        let user = decode_token(token, &config.jwt_secret)?;
        Ok(MaybeUser(Some(user)))
    }
}

/// decode_token
///
/// Verifies the HS256 signature and expiry of `token` and maps its claims to an
/// `AuthUser`.
pub fn decode_token(token: &str, secret: &str) -> Result<AuthUser, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(AuthUser {
            username: data.claims.username,
            role: data.claims.role,
        }),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                kind => tracing::debug!("rejected token: {:?}", kind),
            }
            Err(ApiError::InvalidToken)
        }
    }
}

/// Reads `x-username` and the comma-separated `x-user-role` header.
fn user_from_dev_headers(headers: &HeaderMap) -> Option<AuthUser> {
    let username = headers.get("x-username")?.to_str().ok()?.trim();
    if username.is_empty() {
        return None;
    }
    let role = headers
        .get("x-user-role")
        .and_then(|value| value.to_str().ok())
        .map(|roles| {
            roles
                .split(',')
                .filter_map(|code| code.trim().parse::<i32>().ok())
                .collect()
        })
        .unwrap_or_default();

    Some(AuthUser {
        username: username.to_string(),
        role,
    })
}
