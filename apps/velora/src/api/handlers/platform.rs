//! Home, subscription, notification, and FAQ endpoints under `/api/core/`.

use super::{now, optional_json};
use crate::api::AppState;
use crate::api::auth::AuthUser;
use crate::api::error::{ApiJson, ApiResult, ok};
use crate::api::types::{MarkReadRequest, SubscribeRequest};
use axum::{body::Bytes, extract::State};
use serde::Serialize;
use serde_json::json;
use velora_core::platform::{self, Faq, MarkRead};
use velora_core::{Entitlements, FaqCategory, subscriptions};

#[derive(Debug, Serialize)]
struct FaqGroup {
    category: FaqCategory,
    display_name: &'static str,
    faqs: Vec<Faq>,
}

pub async fn home_handler(State(state): State<AppState>) -> ApiResult {
    let (platform, tiers) = state.store.read(|tx| {
        Ok((
            platform::settings(tx)?,
            subscriptions::list_active_tiers(tx)?,
        ))
    })?;

    ok(json!({
        "platform": platform,
        "subscription_tiers": tiers,
    }))
}

/// Current subscription, its entitlements, and the tiers on offer.
pub async fn subscription_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult {
    let at = now();
    let (subscription, entitlements, tiers) = state.store.read(|tx| {
        Ok((
            subscriptions::subscription_of(tx, user.id)?,
            Entitlements::for_user(tx, user.id, at)?,
            subscriptions::list_active_tiers(tx)?,
        ))
    })?;
    let is_active = subscription.as_ref().is_some_and(|s| s.is_active(at));

    ok(json!({
        "subscription": subscription,
        "is_active": is_active,
        "entitlements": entitlements,
        "subscription_tiers": tiers,
    }))
}

pub async fn subscribe_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(request): ApiJson<SubscribeRequest>,
) -> ApiResult {
    let subscription = state.store.write(|tx| {
        subscriptions::subscribe(tx, user.id, request.tier, request.billing_cycle, now())
    })?;

    tracing::info!(user = user.id.0, tier = %request.tier, "Subscription changed");
    ok(json!({
        "message": "Subscription updated",
        "subscription": subscription,
    }))
}

pub async fn cancel_subscription_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult {
    let subscription = state
        .store
        .write(|tx| subscriptions::cancel(tx, user.id, now()))?;

    tracing::info!(user = user.id.0, "Subscription cancelled");
    ok(json!({
        "message": "Subscription cancelled",
        "subscription": subscription,
    }))
}

pub async fn notifications_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult {
    let at = now();
    let (notifications, unread_count) = state.store.read(|tx| {
        Ok((
            platform::notifications_for(tx, user.id, at)?,
            platform::unread_count(tx, user.id, at)?,
        ))
    })?;

    ok(json!({
        "notifications": notifications,
        "unread_count": unread_count,
    }))
}

/// Mark the listed notifications read, or all of them when none are listed.
pub async fn mark_read_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> ApiResult {
    let request: MarkReadRequest = optional_json(&body)?;
    let (which, message) = match request.notification_ids {
        Some(ids) if !ids.is_empty() => (MarkRead::Ids(ids), "Notifications marked as read"),
        _ => (MarkRead::All, "All notifications marked as read"),
    };
    let marked = state
        .store
        .write(|tx| platform::mark_read(tx, user.id, which, now()))?;

    ok(json!({
        "message": message,
        "marked": marked,
    }))
}

/// Published FAQ entries grouped by category.
pub async fn faq_handler(State(state): State<AppState>) -> ApiResult {
    let groups: Vec<FaqGroup> = state
        .store
        .read(|tx| platform::faq_by_category(tx))?
        .into_iter()
        .map(|(category, faqs)| FaqGroup {
            category,
            display_name: category.display_name(),
            faqs,
        })
        .collect();

    ok(json!({"faq_by_category": groups}))
}
