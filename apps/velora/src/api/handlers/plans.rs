//! Wellness plan endpoints under `/api/wellness-plans/`. Every route is
//! scoped to the authenticated owner; other users' plans are 404.

use super::{now, optional_json};
use crate::api::AppState;
use crate::api::auth::AuthUser;
use crate::api::error::{ApiJson, ApiResult, created, ok};
use axum::{
    body::Bytes,
    extract::{Path, State},
};
use serde::Serialize;
use serde_json::json;
use velora_core::plans::{
    self, NewModule, NewPlan, NewProgress, NewSession, PlanUpdate, SessionCompletion,
    WellnessPlan,
};
use velora_core::{PlanId, PlanSessionId};

#[derive(Debug, Serialize)]
struct PlanView {
    #[serde(flatten)]
    plan: WellnessPlan,
    progress_percentage: u32,
}

impl From<WellnessPlan> for PlanView {
    fn from(plan: WellnessPlan) -> Self {
        Self {
            progress_percentage: plan.progress_percentage(),
            plan,
        }
    }
}

pub async fn list_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult {
    let list: Vec<PlanView> = state
        .store
        .read(|tx| plans::list_for_user(tx, user.id))?
        .into_iter()
        .map(PlanView::from)
        .collect();
    ok(json!({"plans": list}))
}

pub async fn create_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(new): ApiJson<NewPlan>,
) -> ApiResult {
    let plan = state
        .store
        .write(|tx| plans::create_plan(tx, user.id, new, now()))?;

    tracing::info!(user = user.id.0, plan = plan.id.0, "Wellness plan created");
    created(json!({
        "message": "Your wellness plan has been created!",
        "plan": PlanView::from(plan),
    }))
}

/// Plan with its modules and sessions.
pub async fn detail_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<PlanId>,
) -> ApiResult {
    let detail = state.store.read(|tx| plans::detail(tx, user.id, id))?;
    ok(json!({
        "plan": PlanView::from(detail.plan),
        "modules": detail.modules,
        "sessions": detail.sessions,
    }))
}

pub async fn update_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<PlanId>,
    ApiJson(update): ApiJson<PlanUpdate>,
) -> ApiResult {
    let plan = state
        .store
        .write(|tx| plans::update_plan(tx, user.id, id, update, now()))?;

    ok(json!({
        "message": "Wellness plan updated",
        "plan": PlanView::from(plan),
    }))
}

/// Deletes the plan with its modules, sessions, and progress.
pub async fn delete_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<PlanId>,
) -> ApiResult {
    state.store.write(|tx| plans::delete_plan(tx, user.id, id))?;
    tracing::info!(user = user.id.0, plan = id.0, "Wellness plan deleted");
    ok(json!({"message": "Wellness plan deleted"}))
}

/// The 30 most recent progress entries.
pub async fn progress_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<PlanId>,
) -> ApiResult {
    let (plan, entries) = state.store.read(|tx| {
        Ok((
            plans::detail(tx, user.id, id)?.plan,
            plans::progress_for(tx, user.id, id)?,
        ))
    })?;
    ok(json!({
        "plan": PlanView::from(plan),
        "progress_entries": entries,
    }))
}

pub async fn record_progress_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<PlanId>,
    body: Bytes,
) -> ApiResult {
    let new: NewProgress = optional_json(&body)?;
    let entry = state
        .store
        .write(|tx| plans::record_progress(tx, user.id, id, new, now()))?;

    created(json!({
        "message": "Progress recorded",
        "progress": entry,
    }))
}

pub async fn sessions_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<PlanId>,
) -> ApiResult {
    let sessions = state.store.read(|tx| plans::sessions_for(tx, user.id, id))?;
    ok(json!({"sessions": sessions}))
}

pub async fn add_session_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<PlanId>,
    ApiJson(new): ApiJson<NewSession>,
) -> ApiResult {
    let session = state
        .store
        .write(|tx| plans::add_session(tx, user.id, id, new, now()))?;

    created(json!({
        "message": "Session added",
        "session": session,
    }))
}

pub async fn add_module_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<PlanId>,
    ApiJson(new): ApiJson<NewModule>,
) -> ApiResult {
    let module = state
        .store
        .write(|tx| plans::add_module(tx, user.id, id, new, now()))?;

    created(json!({
        "message": "Module added",
        "module": module,
    }))
}

/// Notes and rating are optional; an empty body completes the session.
pub async fn complete_session_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<PlanSessionId>,
    body: Bytes,
) -> ApiResult {
    let completion: SessionCompletion = optional_json(&body)?;
    let session = state
        .store
        .write(|tx| plans::complete_session(tx, user.id, id, completion, now()))?;

    ok(json!({
        "message": "Session completed",
        "session": session,
    }))
}
