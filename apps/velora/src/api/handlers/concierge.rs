//! Client-side concierge endpoints under `/api/concierge/`.

use super::now;
use crate::api::AppState;
use crate::api::auth::AuthUser;
use crate::api::error::{ApiJson, ApiResult, created, ok, to_value};
use axum::extract::{Path, State};
use serde_json::json;
use velora_core::RequestId;
use velora_core::concierge::{self, NewRequest, RequestRating};

/// Five most recent requests and five upcoming confirmed appointments.
pub async fn dashboard_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult {
    let dashboard = state
        .store
        .read(|tx| concierge::dashboard(tx, user.id, now()))?;
    ok(to_value(&dashboard)?)
}

pub async fn create_request_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(new): ApiJson<NewRequest>,
) -> ApiResult {
    let request = state
        .store
        .write(|tx| concierge::create_request(tx, user.id, new, now()))?;

    tracing::info!(user = user.id.0, request = request.id.0, "Concierge request submitted");
    created(json!({
        "message": "Your concierge request has been submitted!",
        "request": request,
    }))
}

pub async fn requests_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult {
    let requests = state
        .store
        .read(|tx| concierge::list_for_client(tx, user.id))?;
    ok(json!({"requests": requests}))
}

/// The request with its service and the notes visible to the client.
pub async fn request_detail_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<RequestId>,
) -> ApiResult {
    let detail = state
        .store
        .read(|tx| concierge::detail(tx, user.id, id))?;
    ok(to_value(&detail)?)
}

pub async fn cancel_request_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<RequestId>,
) -> ApiResult {
    let request = state
        .store
        .write(|tx| concierge::cancel(tx, user.id, id, now()))?;

    ok(json!({
        "message": "Concierge request cancelled",
        "request": request,
    }))
}

pub async fn rate_request_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<RequestId>,
    ApiJson(rating): ApiJson<RequestRating>,
) -> ApiResult {
    let request = state
        .store
        .write(|tx| concierge::rate(tx, user.id, id, rating, now()))?;

    ok(json!({
        "message": "Thank you for your feedback",
        "request": request,
    }))
}

pub async fn appointments_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult {
    let appointments = state
        .store
        .read(|tx| concierge::appointments_for(tx, user.id))?;
    ok(json!({"appointments": appointments}))
}

/// Active services; public.
pub async fn services_handler(State(state): State<AppState>) -> ApiResult {
    let services = state.store.read(|tx| concierge::list_active_services(tx))?;
    ok(json!({"services": services}))
}
