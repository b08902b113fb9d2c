//! # Response Envelope
//!
//! Every response body is a JSON object with a `success` flag. Failures add a
//! `message`; OTP failures also carry `error_code` and, when attempts remain,
//! `remaining_attempts`.
//!
//! Server-side failures never leak details: the client sees
//! "Internal server error" and the cause goes to the log.

use axum::{
    Json,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use velora_core::VeloraError;

// =============================================================================
// ERRORS
// =============================================================================

/// A core error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub VeloraError);

impl From<VeloraError> for ApiError {
    fn from(e: VeloraError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            VeloraError::Validation(_) | VeloraError::Conflict(_) | VeloraError::Otp { .. } => {
                StatusCode::BAD_REQUEST
            }
            VeloraError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            VeloraError::Forbidden(_) => StatusCode::FORBIDDEN,
            VeloraError::NotFound(_) => StatusCode::NOT_FOUND,
            VeloraError::Storage(_) | VeloraError::Serialization(_) | VeloraError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(false));

        if self.0.is_client_error() {
            body.insert("message".to_string(), Value::String(self.0.to_string()));
        } else {
            tracing::error!("Request failed: {}", self.0);
            body.insert(
                "message".to_string(),
                Value::String("Internal server error".to_string()),
            );
        }

        if let VeloraError::Otp {
            code,
            remaining_attempts,
            ..
        } = &self.0
        {
            body.insert("error_code".to_string(), json!(code.as_str()));
            if let Some(remaining) = remaining_attempts {
                body.insert("remaining_attempts".to_string(), json!(remaining));
            }
        }

        (status, Json(Value::Object(body))).into_response()
    }
}

pub type ApiResult = Result<Response, ApiError>;

// =============================================================================
// SUCCESS RESPONSES
// =============================================================================

fn envelope(status: StatusCode, payload: Value) -> Response {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    match payload {
        Value::Object(fields) => body.extend(fields),
        Value::Null => {}
        other => {
            body.insert("data".to_string(), other);
        }
    }
    (status, Json(Value::Object(body))).into_response()
}

/// 200 with `success: true` merged into `payload`.
pub fn ok(payload: Value) -> ApiResult {
    Ok(envelope(StatusCode::OK, payload))
}

/// 201 with `success: true` merged into `payload`.
pub fn created(payload: Value) -> ApiResult {
    Ok(envelope(StatusCode::CREATED, payload))
}

/// Serialize a value for a response body.
pub fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| ApiError(VeloraError::Serialization(e.to_string())))
}

// =============================================================================
// JSON EXTRACTOR
// =============================================================================

/// `Json<T>` whose rejections use the envelope and a 400 status.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(VeloraError::invalid(rejection.body_text()))),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use velora_core::OtpErrorCode;

    #[test]
    fn client_errors_map_to_4xx() {
        let cases = [
            (VeloraError::invalid("bad"), StatusCode::BAD_REQUEST),
            (VeloraError::Conflict("taken".into()), StatusCode::BAD_REQUEST),
            (VeloraError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (VeloraError::Forbidden("tier".into()), StatusCode::FORBIDDEN),
            (VeloraError::NotFound("Wellness plan"), StatusCode::NOT_FOUND),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).status(), status);
        }
    }

    #[test]
    fn server_errors_map_to_500() {
        let error = ApiError(VeloraError::Storage("disk full".into()));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn otp_errors_are_bad_requests() {
        let error = ApiError(VeloraError::Otp {
            code: OtpErrorCode::InvalidOtp,
            message: "Invalid OTP".into(),
            remaining_attempts: Some(2),
        });
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }
}
