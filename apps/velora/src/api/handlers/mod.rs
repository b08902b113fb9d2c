//! # API Endpoint Handlers
//!
//! One module per endpoint group. Handlers read the clock, open a store
//! transaction, call into `velora-core`, and wrap the result in the envelope.

pub mod admin;
pub mod auth;
pub mod concierge;
pub mod plans;
pub mod platform;
pub mod specialists;

use super::error::ApiError;
use super::types::HealthResponse;
use axum::{Json, body::Bytes, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use velora_core::VeloraError;

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an optional JSON body; an empty body yields the default.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError(VeloraError::invalid(format!("Invalid JSON body: {}", e))))
}

/// Run CPU-heavy work (password hashing) off the async worker threads.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, VeloraError>
where
    F: FnOnce() -> Result<T, VeloraError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| VeloraError::Internal(format!("Blocking task failed: {}", e)))?
}

/// Require a non-blank field.
pub(crate) fn required(value: &str, message: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError(VeloraError::invalid(message)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::MarkReadRequest;

    #[tokio::test]
    async fn blocking_passes_results_through() {
        assert_eq!(blocking(|| Ok(7)).await.expect("value"), 7);
        let err = blocking(|| Err::<(), _>(VeloraError::invalid("nope")))
            .await
            .expect_err("error");
        assert!(matches!(err, VeloraError::Validation(_)));
    }

    #[test]
    fn empty_body_is_default() {
        let parsed: MarkReadRequest = optional_json(&Bytes::from_static(b"  ")).expect("default");
        assert!(parsed.notification_ids.is_none());
    }

    #[test]
    fn malformed_body_is_rejected() {
        let parsed: Result<MarkReadRequest, _> = optional_json(&Bytes::from_static(b"{oops"));
        assert!(parsed.is_err());
    }
}
