//! Staff endpoints under `/api/admin/`, guarded by the admin API key.
//!
//! Bodies are the core's input types as-is.

use super::now;
use crate::api::AppState;
use crate::api::error::{ApiJson, ApiResult, created, ok};
use crate::api::types::{AppointmentStatusRequest, AssignRequest};
use axum::extract::{Path, State};
use serde_json::json;
use velora_core::concierge::{self, NewAgent, NewAppointment, NewNote, NewService, StatusUpdate};
use velora_core::platform::{self, NewFaq, NewNotification, PlatformUpdate};
use velora_core::specialists::{self, NewAvailability, NewCategory, NewSpecialist};
use velora_core::subscriptions::{self, NewTier};
use velora_core::{AppointmentId, RequestId, SpecialistId};

fn audit(action: &'static str, id: u64) {
    tracing::info!(event = "admin_action", action, id, "Admin action");
}

// =============================================================================
// CATALOG
// =============================================================================

pub async fn create_tier_handler(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewTier>,
) -> ApiResult {
    let tier = state
        .store
        .write(|tx| subscriptions::create_tier(tx, new, now()))?;
    audit("create_tier", tier.id.0);
    created(json!({"tier": tier}))
}

pub async fn create_category_handler(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewCategory>,
) -> ApiResult {
    let category = state
        .store
        .write(|tx| specialists::create_category(tx, new, now()))?;
    audit("create_category", category.id.0);
    created(json!({"category": category}))
}

pub async fn create_specialist_handler(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewSpecialist>,
) -> ApiResult {
    let specialist = state
        .store
        .write(|tx| specialists::create_specialist(tx, new, now()))?;
    audit("create_specialist", specialist.id.0);
    created(json!({"specialist": specialist}))
}

pub async fn add_availability_handler(
    State(state): State<AppState>,
    Path(id): Path<SpecialistId>,
    ApiJson(new): ApiJson<NewAvailability>,
) -> ApiResult {
    let slot = state
        .store
        .write(|tx| specialists::add_availability(tx, id, new, now()))?;
    audit("add_availability", slot.id.0);
    created(json!({"availability": slot}))
}

pub async fn create_agent_handler(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewAgent>,
) -> ApiResult {
    let agent = state
        .store
        .write(|tx| concierge::create_agent(tx, new, now()))?;
    audit("create_agent", agent.id.0);
    created(json!({"agent": agent}))
}

pub async fn create_service_handler(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewService>,
) -> ApiResult {
    let service = state
        .store
        .write(|tx| concierge::create_service(tx, new, now()))?;
    audit("create_service", service.id.0);
    created(json!({"service": service}))
}

pub async fn create_faq_handler(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewFaq>,
) -> ApiResult {
    let faq = state.store.write(|tx| platform::create_faq(tx, new, now()))?;
    audit("create_faq", faq.id.0);
    created(json!({"faq": faq}))
}

// =============================================================================
// CONCIERGE OPERATIONS
// =============================================================================

pub async fn assign_request_handler(
    State(state): State<AppState>,
    Path(id): Path<RequestId>,
    ApiJson(body): ApiJson<AssignRequest>,
) -> ApiResult {
    let request = state
        .store
        .write(|tx| concierge::assign(tx, id, body.agent, now()))?;
    audit("assign_request", request.id.0);
    ok(json!({
        "message": "Request assigned",
        "request": request,
    }))
}

pub async fn request_status_handler(
    State(state): State<AppState>,
    Path(id): Path<RequestId>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> ApiResult {
    let request = state
        .store
        .write(|tx| concierge::update_status(tx, id, update, now()))?;
    audit("update_request_status", request.id.0);
    ok(json!({
        "message": "Request status updated",
        "request": request,
    }))
}

pub async fn schedule_appointment_handler(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewAppointment>,
) -> ApiResult {
    let appointment = state.store.write(|tx| concierge::schedule(tx, new, now()))?;
    audit("schedule_appointment", appointment.id.0);
    created(json!({"appointment": appointment}))
}

pub async fn appointment_status_handler(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    ApiJson(body): ApiJson<AppointmentStatusRequest>,
) -> ApiResult {
    let appointment = state
        .store
        .write(|tx| concierge::set_appointment_status(tx, id, body.status, now()))?;
    audit("appointment_status", appointment.id.0);
    ok(json!({
        "message": "Appointment updated",
        "appointment": appointment,
    }))
}

pub async fn add_note_handler(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewNote>,
) -> ApiResult {
    let note = state.store.write(|tx| concierge::add_note(tx, new, now()))?;
    audit("add_note", note.id.0);
    created(json!({"note": note}))
}

// =============================================================================
// PLATFORM
// =============================================================================

pub async fn notify_handler(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewNotification>,
) -> ApiResult {
    let notification = state.store.write(|tx| platform::notify(tx, new, now()))?;
    audit("notify", notification.id.0);
    created(json!({"notification": notification}))
}

pub async fn platform_settings_handler(State(state): State<AppState>) -> ApiResult {
    let settings = state.store.read(|tx| platform::settings(tx))?;
    ok(json!({"platform": settings}))
}

pub async fn update_platform_handler(
    State(state): State<AppState>,
    ApiJson(update): ApiJson<PlatformUpdate>,
) -> ApiResult {
    let settings = state
        .store
        .write(|tx| platform::update_settings(tx, update, now()))?;
    audit("update_platform", 0);
    ok(json!({
        "message": "Platform settings updated",
        "platform": settings,
    }))
}
