//! Specialist directory, booking, and review endpoints under `/api/specialists/`.

use super::now;
use crate::api::AppState;
use crate::api::auth::AuthUser;
use crate::api::error::{ApiJson, ApiResult, created, ok};
use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::json;
use velora_core::specialists::{self, NewReview, Specialist, SpecialistAvailability};
use velora_core::{Reader, SpecialistId, VeloraError, accounts};

/// A specialist with the display name built from their account.
#[derive(Debug, Serialize)]
struct SpecialistView {
    #[serde(flatten)]
    specialist: Specialist,
    full_name: String,
}

fn view(tx: &impl Reader, specialist: Specialist) -> Result<SpecialistView, VeloraError> {
    let user = accounts::get(tx, specialist.user)?;
    Ok(SpecialistView {
        full_name: specialist.full_name(&user),
        specialist,
    })
}

fn views(
    tx: &impl Reader,
    list: Vec<Specialist>,
) -> Result<Vec<SpecialistView>, VeloraError> {
    list.into_iter().map(|s| view(tx, s)).collect()
}

#[derive(Debug, Serialize)]
struct SlotView {
    #[serde(flatten)]
    slot: SpecialistAvailability,
    day_name: &'static str,
}

/// Specialists accepting clients, with the active categories.
pub async fn list_handler(State(state): State<AppState>) -> ApiResult {
    let (list, categories) = state.store.read(|tx| {
        Ok((
            views(tx, specialists::list_accepting(tx)?)?,
            specialists::list_active_categories(tx)?,
        ))
    })?;

    ok(json!({
        "specialists": list,
        "categories": categories,
    }))
}

/// A specialist with up to ten public reviews.
pub async fn detail_handler(
    State(state): State<AppState>,
    Path(id): Path<SpecialistId>,
) -> ApiResult {
    let (specialist, reviews) = state.store.read(|tx| {
        let (specialist, reviews) = specialists::detail(tx, id)?;
        Ok((view(tx, specialist)?, reviews))
    })?;

    ok(json!({
        "specialist": specialist,
        "reviews": reviews,
    }))
}

pub async fn availability_handler(
    State(state): State<AppState>,
    Path(id): Path<SpecialistId>,
) -> ApiResult {
    let slots: Vec<SlotView> = state
        .store
        .read(|tx| {
            specialists::get(tx, id)?;
            specialists::availability_for(tx, id)
        })?
        .into_iter()
        .map(|slot| SlotView {
            day_name: specialists::weekday_name(slot.day_of_week).unwrap_or_default(),
            slot,
        })
        .collect();

    ok(json!({"availability": slots}))
}

/// Unknown categories yield an empty list rather than 404.
pub async fn by_category_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult {
    let (category, list) = state.store.read(|tx| {
        let (category, list) = specialists::by_category(tx, &name)?;
        Ok((category, views(tx, list)?))
    })?;

    ok(json!({
        "category": category,
        "specialists": list,
    }))
}

pub async fn book_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<SpecialistId>,
) -> ApiResult {
    let specialist = state.store.write(|tx| {
        let specialist = specialists::book(tx, user.id, id, now())?;
        view(tx, specialist)
    })?;

    tracing::info!(user = user.id.0, specialist = id.0, "Specialist booked");
    ok(json!({
        "message": "Booking requested successfully",
        "specialist": specialist,
    }))
}

pub async fn reviews_handler(
    State(state): State<AppState>,
    Path(id): Path<SpecialistId>,
) -> ApiResult {
    let (specialist, reviews) = state.store.read(|tx| {
        let specialist = view(tx, specialists::get(tx, id)?)?;
        Ok((specialist, specialists::public_reviews(tx, id)?))
    })?;

    ok(json!({
        "specialist": specialist,
        "reviews": reviews,
    }))
}

pub async fn submit_review_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<SpecialistId>,
    ApiJson(review): ApiJson<NewReview>,
) -> ApiResult {
    let review = state
        .store
        .write(|tx| specialists::submit_review(tx, user.id, id, review, now()))?;

    created(json!({
        "message": "Review submitted",
        "review": review,
    }))
}
