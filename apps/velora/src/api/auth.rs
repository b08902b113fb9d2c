//! # Authentication Module
//!
//! Two schemes guard the API:
//!
//! - Users send `Authorization: Bearer <access token>`; handlers take an
//!   [`AuthUser`] argument to require it
//! - Staff endpoints under `/api/admin/` require `X-Api-Key: <key>` matching
//!   `VELORA_ADMIN_KEY`; without a configured key those routes are not mounted

use super::AppState;
use super::error::ApiError;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use velora_core::{User, VeloraError, accounts};

/// Header carrying the admin API key.
pub const ADMIN_KEY_HEADER: &str = "x-api-key";

// =============================================================================
// USER TOKENS
// =============================================================================

/// The authenticated, active account making the request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Err(ApiError(VeloraError::Unauthorized(
                "Authentication credentials were not provided.".to_string(),
            )));
        };

        let user_id = state.tokens.verify_access(token, Utc::now()).map_err(|e| {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_token",
                "Authentication failed: invalid or expired token"
            );
            ApiError(e)
        })?;

        let user = state
            .store
            .read(|tx| accounts::get(tx, user_id))
            .map_err(|_| {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "unknown_user",
                    user = user_id.0,
                    "Token refers to a missing account"
                );
                ApiError(VeloraError::Unauthorized(
                    "Invalid or expired token".to_string(),
                ))
            })?;
        accounts::ensure_active(&user)?;
        Ok(Self(user))
    }
}

// =============================================================================
// ADMIN API KEY
// =============================================================================

/// Constant-time key comparison.
///
/// Both keys are padded to the same length so the comparison always runs
/// over the same number of bytes.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();
    let max_len = provided_bytes.len().max(expected_bytes.len());

    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// Rejects requests without the admin key.
pub async fn admin_key_middleware(
    State(expected): State<Arc<str>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if keys_match(key, &expected) => next.run(request).await,
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_api_key",
                "Admin authentication failed: invalid API key"
            );
            unauthorized()
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_api_key",
                "Admin authentication failed: missing X-Api-Key header"
            );
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    ApiError(VeloraError::Unauthorized("Unauthorized".to_string())).into_response()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_match() {
        assert!(keys_match("s3cret-key", "s3cret-key"));
    }

    #[test]
    fn prefix_does_not_match() {
        assert!(!keys_match("s3cret", "s3cret-key"));
        assert!(!keys_match("s3cret-key-extra", "s3cret-key"));
        assert!(!keys_match("", "s3cret-key"));
    }

    #[test]
    fn bearer_requires_scheme_and_token() {
        let parts = |value: &str| {
            let (parts, ()) = Request::builder()
                .header(header::AUTHORIZATION, value)
                .body(())
                .expect("request")
                .into_parts();
            parts
        };
        assert_eq!(bearer_token(&parts("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&parts("Bearer   ")), None);
        assert_eq!(bearer_token(&parts("Token abc")), None);
    }
}
