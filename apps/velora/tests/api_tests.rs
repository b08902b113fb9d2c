//! Integration tests for the VELORA HTTP API.
//!
//! Uses axum-test to exercise the router without starting a real server.
//! OTP codes are read back from an in-memory mailer.

#![allow(clippy::unwrap_used, clippy::panic, clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use velora::api::types::HealthResponse;
use velora::api::{AppState, create_router};
use velora::config::AppConfig;
use velora::mailer::MemoryMailer;
use chrono::{Duration, Utc};
use velora_core::{OtpPolicy, OtpPurpose, Store, otp};

const ADMIN_KEY: &str = "test-admin-key";
const PASSWORD: &str = "correct-horse-battery";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: "integration-test-secret".to_string(),
        admin_key: Some(ADMIN_KEY.to_string()),
        rate_limit: 0,
        ..AppConfig::default()
    }
}

fn create_server_on(store: Store, config: AppConfig) -> (TestServer, Arc<MemoryMailer>) {
    let mailer = Arc::new(MemoryMailer::new());
    let state = AppState::new(store, config, mailer.clone());
    (TestServer::new(create_router(state)).unwrap(), mailer)
}

fn create_server_with(config: AppConfig) -> (TestServer, Arc<MemoryMailer>) {
    create_server_on(Store::in_memory().unwrap(), config)
}

fn create_test_server() -> (TestServer, Arc<MemoryMailer>) {
    create_server_with(test_config())
}

fn bearer(token: &str) -> HeaderValue {
    format!("Bearer {}", token).parse().unwrap()
}

fn admin_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_static(ADMIN_KEY),
    )
}

/// The code from the latest email sent to `email`.
fn otp_for(mailer: &MemoryMailer, email: &str) -> String {
    let message = mailer.last_to(email).expect("no email sent");
    message
        .body
        .lines()
        .find_map(|line| line.split("verification code is: ").nth(1))
        .map(|code| code.trim().to_string())
        .expect("no code in email body")
}

/// Run the three-step registration and return the access token.
async fn register(server: &TestServer, mailer: &MemoryMailer, email: &str) -> String {
    let started = server
        .post("/api/auth/register/")
        .json(&json!({"email": email}))
        .await;
    started.assert_status_ok();
    let session_id = started.json::<Value>()["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    server
        .post("/api/auth/register/verify/")
        .json(&json!({
            "email": email,
            "otp": otp_for(mailer, email),
            "session_id": session_id,
        }))
        .await
        .assert_status_ok();

    let completed = server
        .post("/api/auth/register/complete/")
        .json(&json!({
            "session_id": session_id,
            "password": PASSWORD,
            "confirm_password": PASSWORD,
            "first_name": "Ada",
            "last_name": "Lovelace",
        }))
        .await;
    completed.assert_status(StatusCode::CREATED);
    completed.json::<Value>()["tokens"]["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn user_id(server: &TestServer, access: &str) -> Value {
    let profile: Value = server
        .get("/api/auth/profile/")
        .add_header(header::AUTHORIZATION, bearer(access))
        .await
        .json();
    profile["user"]["id"].clone()
}

async fn subscribe_basic(server: &TestServer, access: &str) {
    server
        .post("/api/core/subscription/")
        .add_header(header::AUTHORIZATION, bearer(access))
        .json(&json!({"tier": "basic"}))
        .await
        .assert_status_ok();
}

/// Register a specialist account and give it a specialist profile.
async fn create_specialist(
    server: &TestServer,
    mailer: &MemoryMailer,
    email: &str,
    tier: &str,
    categories: Value,
) -> u64 {
    let access = register(server, mailer, email).await;
    let user = user_id(server, &access).await;
    let body = admin_post(
        server,
        "/api/admin/specialists/",
        json!({
            "user": user,
            "categories": categories,
            "title": "Dr.",
            "professional_summary": "Sports medicine and recovery",
            "tier": tier,
            "hourly_rate_cents": 15000,
            "consultation_rate_cents": 5000,
        }),
    )
    .await;
    body["specialist"]["id"].as_u64().unwrap()
}

fn review_body() -> Value {
    json!({
        "rating": 5,
        "title": "Excellent",
        "review_text": "Helped me recover from a knee injury",
        "professionalism": 5,
        "expertise": 5,
        "communication": 4,
        "results": 5,
    })
}

async fn admin_post(server: &TestServer, path: &str, body: Value) -> Value {
    let (name, value) = admin_header();
    let response = server.post(path).add_header(name, value).json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

async fn create_basic_tier(server: &TestServer) {
    admin_post(
        server,
        "/api/admin/tiers/",
        json!({
            "name": "basic",
            "display_name": "Basic",
            "monthly_price_cents": 9900,
            "annual_price_cents": 99000,
            "max_wellness_plans": 2,
            "concierge_support": true,
        }),
    )
    .await;
}

fn plan_body(title: &str) -> Value {
    json!({
        "title": title,
        "plan_type": "fitness",
        "difficulty_level": "beginner",
        "duration_weeks": 4,
        "sessions_per_week": 3,
        "estimated_time_per_session": 45,
    })
}

// =============================================================================
// HEALTH
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// REGISTRATION & LOGIN
// =============================================================================

#[tokio::test]
async fn test_full_registration_flow_returns_tokens() {
    let (server, mailer) = create_test_server();

    let access = register(&server, &mailer, "ada@example.com").await;

    let profile = server
        .get("/api/auth/profile/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await;
    profile.assert_status_ok();
    let body: Value = profile.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["full_name"], "Ada Lovelace");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_existing_email_is_rejected() {
    let (server, mailer) = create_test_server();
    register(&server, &mailer, "taken@example.com").await;

    let response = server
        .post("/api/auth/register/")
        .json(&json!({"email": "taken@example.com"}))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_wrong_otp_reports_error_code_and_remaining_attempts() {
    let (server, mailer) = create_test_server();
    let started = server
        .post("/api/auth/register/")
        .json(&json!({"email": "otp@example.com"}))
        .await;
    let session_id = started.json::<Value>()["session_id"].clone();
    let real = otp_for(&mailer, "otp@example.com");
    let wrong = if real == "000000" { "111111" } else { "000000" };

    let response = server
        .post("/api/auth/register/verify/")
        .json(&json!({
            "email": "otp@example.com",
            "otp": wrong,
            "session_id": session_id,
        }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "INVALID_OTP");
    assert!(body["remaining_attempts"].as_u64().is_some());
}

#[tokio::test]
async fn test_password_login_and_bad_password() {
    let (server, mailer) = create_test_server();
    register(&server, &mailer, "login@example.com").await;

    let ok = server
        .post("/api/auth/login/")
        .json(&json!({"email": "login@example.com", "password": PASSWORD}))
        .await;
    ok.assert_status_ok();
    let body: Value = ok.json();
    assert_eq!(body["message"], "Login successful");
    assert!(body["tokens"]["refresh_token"].is_string());

    let bad = server
        .post("/api/auth/login/")
        .json(&json!({"email": "login@example.com", "password": "wrong-password"}))
        .await;
    bad.assert_status_unauthorized();
    assert_eq!(bad.json::<Value>()["success"], false);
}

#[tokio::test]
async fn test_refresh_then_logout_revokes_refresh_token() {
    let (server, mailer) = create_test_server();
    register(&server, &mailer, "refresh@example.com").await;
    let login: Value = server
        .post("/api/auth/login/")
        .json(&json!({"email": "refresh@example.com", "password": PASSWORD}))
        .await
        .json();
    let access = login["tokens"]["access_token"].as_str().unwrap().to_string();
    let refresh = login["tokens"]["refresh_token"].as_str().unwrap().to_string();

    server
        .post("/api/auth/logout/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&json!({"refresh": refresh}))
        .await
        .assert_status_ok();

    let reused = server
        .post("/api/auth/token/refresh/")
        .json(&json!({"refresh": refresh}))
        .await;
    reused.assert_status_unauthorized();
}

#[tokio::test]
async fn test_protected_route_requires_bearer_token() {
    let (server, _) = create_test_server();

    let missing = server.get("/api/auth/profile/").await;
    missing.assert_status_unauthorized();
    assert_eq!(
        missing.json::<Value>()["message"],
        "Authentication credentials were not provided."
    );

    let garbage = server
        .get("/api/auth/profile/")
        .add_header(header::AUTHORIZATION, bearer("not-a-jwt"))
        .await;
    garbage.assert_status_unauthorized();
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let (server, _) = create_test_server();

    let response = server
        .post("/api/auth/register/")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["success"], false);
}

#[tokio::test]
async fn test_demo_login_is_disabled_by_default() {
    let (server, _) = create_test_server();
    server
        .post("/api/auth/demo/login/")
        .await
        .assert_status_not_found();

    let (server, _) = create_server_with(AppConfig {
        demo_login: true,
        ..test_config()
    });
    let response = server.post("/api/auth/demo/login/").await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["tokens"]["access_token"].is_string());
}

#[tokio::test]
async fn test_demo_login_never_hands_out_a_registered_account() {
    let (server, mailer) = create_server_with(AppConfig {
        demo_login: true,
        ..test_config()
    });
    let access = register(&server, &mailer, "demo_user@victim.com").await;
    let victim = user_id(&server, &access).await;

    let response = server.post("/api/auth/demo/login/").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_ne!(body["user"]["id"], victim);
    assert_eq!(body["user"]["email"], "demo@example.com");
    assert_eq!(body["user"]["username"], "demo_user");
}

#[tokio::test]
async fn test_otp_login_flow_and_code_reuse() {
    let (server, mailer) = create_test_server();
    register(&server, &mailer, "otp-login@example.com").await;

    server
        .post("/api/auth/resend-otp/")
        .json(&json!({"email": "otp-login@example.com", "purpose": "login"}))
        .await
        .assert_status_ok();
    let code = otp_for(&mailer, "otp-login@example.com");
    let login = json!({"email": "otp-login@example.com", "otp": code});

    let ok = server.post("/api/auth/login/otp/").json(&login).await;
    ok.assert_status_ok();
    let body: Value = ok.json();
    assert_eq!(body["message"], "Login successful");
    assert!(body["tokens"]["access_token"].is_string());

    let reused = server.post("/api/auth/login/otp/").json(&login).await;
    reused.assert_status_bad_request();
    let body: Value = reused.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "OTP_ALREADY_USED");
}

#[tokio::test]
async fn test_otp_login_without_account_leaves_code_unused() {
    let (server, mailer) = create_test_server();
    server
        .post("/api/auth/resend-otp/")
        .json(&json!({"email": "ghost@example.com", "purpose": "login"}))
        .await
        .assert_status_ok();
    let login = json!({
        "email": "ghost@example.com",
        "otp": otp_for(&mailer, "ghost@example.com"),
    });

    let first = server.post("/api/auth/login/otp/").json(&login).await;
    first.assert_status_not_found();

    // The failed lookup rolled back the verification, so the code is not spent.
    let second = server.post("/api/auth/login/otp/").json(&login).await;
    second.assert_status_not_found();
    assert!(second.json::<Value>().get("error_code").is_none());
}

#[tokio::test]
async fn test_expired_otp_reports_error_code() {
    let store = Store::in_memory().unwrap();
    let issued = store
        .write(|tx| {
            otp::issue(
                tx,
                &OtpPolicy::default(),
                "late@example.com",
                OtpPurpose::Login,
                Utc::now() - Duration::hours(1),
            )
        })
        .unwrap();
    let (server, _) = create_server_on(store, test_config());

    let response = server
        .post("/api/auth/login/otp/")
        .json(&json!({"email": "late@example.com", "otp": issued.code}))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "OTP_EXPIRED");
    assert!(body.get("remaining_attempts").is_none());
}

#[tokio::test]
async fn test_resend_otp_hides_code_unless_debug_enabled() {
    let (server, mailer) = create_test_server();
    let response = server
        .post("/api/auth/resend-otp/")
        .json(&json!({"email": "resend@example.com"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "OTP resent to your email");
    assert!(body.get("debug_info").is_none());
    assert!(mailer.last_to("resend@example.com").is_some());

    let (server, mailer) = create_server_with(AppConfig {
        expose_debug_otp: true,
        ..test_config()
    });
    let body: Value = server
        .post("/api/auth/resend-otp/")
        .json(&json!({"email": "resend@example.com"}))
        .await
        .json();
    assert_eq!(body["debug_info"]["otp_generated"], true);
    assert_eq!(
        body["debug_info"]["otp_value"],
        otp_for(&mailer, "resend@example.com")
    );
}

#[tokio::test]
async fn test_profile_update_and_duplicate_email() {
    let (server, mailer) = create_test_server();
    register(&server, &mailer, "first@example.com").await;
    let access = register(&server, &mailer, "second@example.com").await;

    let updated = server
        .patch("/api/auth/profile/update/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&json!({"bio": "Trail runner", "primary_goal": "build_muscle"}))
        .await;
    updated.assert_status_ok();
    let body: Value = updated.json();
    assert_eq!(body["message"], "Profile updated successfully");
    assert_eq!(body["user"]["bio"], "Trail runner");
    assert_eq!(body["user"]["profile"]["primary_goal"], "build_muscle");

    let renamed = server
        .put("/api/auth/profile/update/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&json!({"first_name": "Grace"}))
        .await;
    renamed.assert_status_ok();
    assert_eq!(renamed.json::<Value>()["user"]["first_name"], "Grace");

    let duplicate = server
        .patch("/api/auth/profile/update/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&json!({"email": "first@example.com"}))
        .await;
    duplicate.assert_status_bad_request();
    let body: Value = duplicate.json();
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_complete_onboarding() {
    let (server, mailer) = create_test_server();
    let access = register(&server, &mailer, "onboard@example.com").await;

    let response = server
        .post("/api/auth/onboarding/complete/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Onboarding completed successfully");
    assert_eq!(body["user"]["onboarded"], true);
}

#[tokio::test]
async fn test_profile_lists_recent_activity() {
    let (server, mailer) = create_test_server();
    let access = register(&server, &mailer, "active@example.com").await;
    server
        .post("/api/auth/login/")
        .json(&json!({"email": "active@example.com", "password": PASSWORD}))
        .await
        .assert_status_ok();

    let body: Value = server
        .get("/api/auth/profile/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .json();

    let activity = body["recent_activity"].as_array().unwrap();
    assert!(!activity.is_empty());
    assert_eq!(activity[0]["activity_type"], "login");
}

// =============================================================================
// ADMIN API
// =============================================================================

#[tokio::test]
async fn test_admin_routes_require_api_key() {
    let (server, _) = create_test_server();
    let tier = json!({
        "name": "premium",
        "display_name": "Premium",
        "monthly_price_cents": 29900,
        "annual_price_cents": 299000,
    });

    let anonymous = server.post("/api/admin/tiers/").json(&tier).await;
    anonymous.assert_status_unauthorized();

    let wrong = server
        .post("/api/admin/tiers/")
        .add_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("wrong-key"),
        )
        .json(&tier)
        .await;
    wrong.assert_status_unauthorized();

    let body = admin_post(&server, "/api/admin/tiers/", tier).await;
    assert_eq!(body["tier"]["name"], "premium");
}

#[tokio::test]
async fn test_admin_routes_absent_without_key() {
    let (server, _) = create_server_with(AppConfig {
        admin_key: None,
        ..test_config()
    });

    server
        .post("/api/admin/tiers/")
        .json(&json!({}))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_admin_trial_period_is_bounded() {
    let (server, _) = create_test_server();
    let (name, value) = admin_header();

    let rejected = server
        .patch("/api/admin/platform/")
        .add_header(name.clone(), value.clone())
        .json(&json!({"trial_period_days": 4_000_000_000u32}))
        .await;
    rejected.assert_status_bad_request();

    let accepted = server
        .patch("/api/admin/platform/")
        .add_header(name, value)
        .json(&json!({"trial_period_days": 30}))
        .await;
    accepted.assert_status_ok();
}

// =============================================================================
// SUBSCRIPTIONS & PLATFORM
// =============================================================================

#[tokio::test]
async fn test_home_lists_active_tiers() {
    let (server, _) = create_test_server();
    create_basic_tier(&server).await;

    let response = server.get("/api/core/").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["subscription_tiers"].as_array().unwrap().len(), 1);
    assert_eq!(body["subscription_tiers"][0]["name"], "basic");
}

#[tokio::test]
async fn test_subscribe_and_cancel() {
    let (server, mailer) = create_test_server();
    create_basic_tier(&server).await;
    let access = register(&server, &mailer, "sub@example.com").await;

    let subscribed = server
        .post("/api/core/subscription/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&json!({"tier": "basic"}))
        .await;
    subscribed.assert_status_ok();

    let current: Value = server
        .get("/api/core/subscription/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .json();
    assert_eq!(current["is_active"], true);

    server
        .post("/api/core/subscription/cancel/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_notifications_mark_all_read() {
    let (server, mailer) = create_test_server();
    let access = register(&server, &mailer, "notes@example.com").await;
    let profile: Value = server
        .get("/api/auth/profile/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .json();
    let user_id = profile["user"]["id"].clone();

    admin_post(
        &server,
        "/api/admin/notifications/",
        json!({"user": user_id, "title": "Welcome", "message": "Hello there"}),
    )
    .await;

    let listed: Value = server
        .get("/api/core/notifications/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .json();
    assert_eq!(listed["unread_count"], 1);

    server
        .post("/api/core/notifications/mark-read/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .assert_status_ok();

    let after: Value = server
        .get("/api/core/notifications/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .json();
    assert_eq!(after["unread_count"], 0);
}

// =============================================================================
// SPECIALISTS
// =============================================================================

#[tokio::test]
async fn test_specialist_directory_routes() {
    let (server, mailer) = create_test_server();
    let category = admin_post(
        &server,
        "/api/admin/categories/",
        json!({"name": "physiotherapy"}),
    )
    .await;
    let category_id = category["category"]["id"].clone();
    let physio = create_specialist(
        &server,
        &mailer,
        "physio@example.com",
        "basic",
        json!([category_id]),
    )
    .await;
    create_specialist(&server, &mailer, "coach@example.com", "premium", json!([])).await;

    let listed: Value = server.get("/api/specialists/").await.json();
    assert_eq!(listed["specialists"].as_array().unwrap().len(), 2);
    assert_eq!(listed["categories"][0]["name"], "physiotherapy");

    let detail = server.get(&format!("/api/specialists/{}/", physio)).await;
    detail.assert_status_ok();
    let body: Value = detail.json();
    assert_eq!(body["specialist"]["id"], physio);
    assert!(body["specialist"]["full_name"].is_string());
    assert_eq!(body["reviews"].as_array().unwrap().len(), 0);

    server
        .get("/api/specialists/999/")
        .await
        .assert_status_not_found();

    let by_category: Value = server
        .get("/api/specialists/category/physiotherapy/")
        .await
        .json();
    assert_eq!(by_category["category"]["name"], "physiotherapy");
    assert_eq!(by_category["specialists"].as_array().unwrap().len(), 1);
    assert_eq!(by_category["specialists"][0]["id"], physio);

    let unknown = server.get("/api/specialists/category/astrology/").await;
    unknown.assert_status_ok();
    let body: Value = unknown.json();
    assert!(body["category"].is_null());
    assert_eq!(body["specialists"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_specialist_availability() {
    let (server, mailer) = create_test_server();
    let physio = create_specialist(&server, &mailer, "slots@example.com", "basic", json!([])).await;
    let slot = json!({"day_of_week": 0, "start_time": "09:00:00", "end_time": "12:00:00"});
    let path = format!("/api/admin/specialists/{}/availability/", physio);
    admin_post(&server, &path, slot.clone()).await;

    let (name, value) = admin_header();
    server
        .post(&path)
        .add_header(name, value)
        .json(&slot)
        .await
        .assert_status_bad_request();

    let body: Value = server
        .get(&format!("/api/specialists/{}/availability/", physio))
        .await
        .json();
    let slots = body["availability"].as_array().unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0]["day_name"], "Monday");
    assert_eq!(slots[0]["start_time"], "09:00:00");
}

#[tokio::test]
async fn test_booking_checks_tier_and_allowance() {
    let (server, mailer) = create_test_server();
    create_basic_tier(&server).await;
    let first = create_specialist(&server, &mailer, "first@clinic.com", "basic", json!([])).await;
    let second = create_specialist(&server, &mailer, "second@clinic.com", "basic", json!([])).await;
    let premium =
        create_specialist(&server, &mailer, "premium@clinic.com", "premium", json!([])).await;
    let access = register(&server, &mailer, "client@example.com").await;
    let book = |id: u64| format!("/api/specialists/book/{}/", id);

    let free = server
        .post(&book(first))
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await;
    free.assert_status(StatusCode::FORBIDDEN);

    subscribe_basic(&server, &access).await;

    let above_tier = server
        .post(&book(premium))
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await;
    above_tier.assert_status(StatusCode::FORBIDDEN);
    assert!(above_tier.json::<Value>()["message"]
        .as_str()
        .unwrap()
        .contains("subscription or higher"));

    let booked = server
        .post(&book(first))
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await;
    booked.assert_status_ok();
    let body: Value = booked.json();
    assert_eq!(body["message"], "Booking requested successfully");
    assert_eq!(body["specialist"]["total_clients"], 1);

    let over_allowance = server
        .post(&book(second))
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await;
    over_allowance.assert_status(StatusCode::FORBIDDEN);
    assert!(over_allowance.json::<Value>()["message"]
        .as_str()
        .unwrap()
        .contains("limit reached"));
}

#[tokio::test]
async fn test_reviews_are_one_per_client() {
    let (server, mailer) = create_test_server();
    let physio = create_specialist(&server, &mailer, "reviewed@clinic.com", "basic", json!([])).await;
    let access = register(&server, &mailer, "reviewer@example.com").await;
    let path = format!("/api/specialists/reviews/{}/", physio);

    server
        .post(&path)
        .json(&review_body())
        .await
        .assert_status_unauthorized();

    let submitted = server
        .post(&path)
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&review_body())
        .await;
    submitted.assert_status(StatusCode::CREATED);
    assert_eq!(submitted.json::<Value>()["review"]["rating"], 5);

    let duplicate = server
        .post(&path)
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&review_body())
        .await;
    duplicate.assert_status_bad_request();
    assert!(duplicate.json::<Value>()["message"]
        .as_str()
        .unwrap()
        .contains("already reviewed"));

    let listed: Value = server.get(&path).await.json();
    assert_eq!(listed["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(listed["specialist"]["total_reviews"], 1);
}

// =============================================================================
// WELLNESS PLANS
// =============================================================================

#[tokio::test]
async fn test_free_user_plan_allowance() {
    let (server, mailer) = create_test_server();
    let access = register(&server, &mailer, "plans@example.com").await;

    let first = server
        .post("/api/wellness-plans/create/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&plan_body("First plan"))
        .await;
    first.assert_status(StatusCode::CREATED);
    let plan = first.json::<Value>()["plan"].clone();
    assert_eq!(plan["status"], "draft");
    assert_eq!(plan["progress_percentage"], 0);

    let second = server
        .post("/api/wellness-plans/create/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&plan_body("Second plan"))
        .await;
    second.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_plans_are_scoped_to_owner() {
    let (server, mailer) = create_test_server();
    let owner = register(&server, &mailer, "owner@example.com").await;
    let other = register(&server, &mailer, "other@example.com").await;

    let created: Value = server
        .post("/api/wellness-plans/create/")
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .json(&plan_body("Private plan"))
        .await
        .json();
    let id = created["plan"]["id"].as_u64().unwrap();

    server
        .get(&format!("/api/wellness-plans/{}/", id))
        .add_header(header::AUTHORIZATION, bearer(&other))
        .await
        .assert_status_not_found();

    let detail = server
        .get(&format!("/api/wellness-plans/{}/", id))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .await;
    detail.assert_status_ok();
    assert_eq!(detail.json::<Value>()["plan"]["title"], "Private plan");

    server
        .delete(&format!("/api/wellness-plans/{}/", id))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_plan_length_is_bounded() {
    let (server, mailer) = create_test_server();
    let access = register(&server, &mailer, "long@example.com").await;

    for weeks in [json!(521), json!(u32::MAX)] {
        let mut body = plan_body("Forever plan");
        body["duration_weeks"] = weeks;
        let response = server
            .post("/api/wellness-plans/create/")
            .add_header(header::AUTHORIZATION, bearer(&access))
            .json(&body)
            .await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["success"], false);
    }

    let mut longest = plan_body("Ten years");
    longest["duration_weeks"] = json!(520);
    server
        .post("/api/wellness-plans/create/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&longest)
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_plan_modules_sessions_and_completion() {
    let (server, mailer) = create_test_server();
    let access = register(&server, &mailer, "sessions@example.com").await;
    let other = register(&server, &mailer, "intruder@example.com").await;
    let created: Value = server
        .post("/api/wellness-plans/create/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&plan_body("Strength block"))
        .await
        .json();
    let plan_id = created["plan"]["id"].as_u64().unwrap();

    let module = server
        .post(&format!("/api/wellness-plans/{}/modules/", plan_id))
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&json!({"title": "Lower body", "module_type": "fitness"}))
        .await;
    module.assert_status(StatusCode::CREATED);
    let module_id = module.json::<Value>()["module"]["id"].clone();

    server
        .post(&format!("/api/wellness-plans/{}/modules/", plan_id))
        .add_header(header::AUTHORIZATION, bearer(&other))
        .json(&json!({"title": "Sneaky", "module_type": "fitness"}))
        .await
        .assert_status_not_found();

    let session = json!({
        "module": module_id,
        "title": "Squats",
        "week_number": 1,
        "session_number": 1,
        "scheduled_date": "2026-03-02T08:00:00Z",
        "duration_minutes": 45,
    });
    let added = server
        .post(&format!("/api/wellness-plans/{}/sessions/", plan_id))
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&session)
        .await;
    added.assert_status(StatusCode::CREATED);
    let session_id = added.json::<Value>()["session"]["id"].as_u64().unwrap();

    server
        .post(&format!("/api/wellness-plans/{}/sessions/", plan_id))
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&session)
        .await
        .assert_status_bad_request();

    let complete = format!("/api/wellness-plans/session/{}/complete/", session_id);
    server
        .post(&complete)
        .add_header(header::AUTHORIZATION, bearer(&other))
        .await
        .assert_status_not_found();

    let done = server
        .post(&complete)
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&json!({"notes": "Felt strong", "rating": 4}))
        .await;
    done.assert_status_ok();
    let body: Value = done.json();
    assert_eq!(body["message"], "Session completed");
    assert_eq!(body["session"]["status"], "completed");

    server
        .post(&complete)
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .assert_status_bad_request();

    let listed: Value = server
        .get(&format!("/api/wellness-plans/{}/sessions/", plan_id))
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .json();
    assert_eq!(listed["sessions"][0]["status"], "completed");
}

// =============================================================================
// CONCIERGE
// =============================================================================

#[tokio::test]
async fn test_concierge_request_requires_subscription() {
    let (server, mailer) = create_test_server();
    create_basic_tier(&server).await;
    let service = admin_post(
        &server,
        "/api/admin/services/",
        json!({"name": "Appointment booking", "category": "scheduling"}),
    )
    .await;
    let service_id = service["service"]["id"].clone();
    let access = register(&server, &mailer, "client@example.com").await;
    let request = json!({
        "service": service_id,
        "title": "Book a physio",
        "description": "Any weekday morning",
    });

    let denied = server
        .post("/api/concierge/request/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&request)
        .await;
    denied.assert_status(StatusCode::FORBIDDEN);

    server
        .post("/api/core/subscription/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&json!({"tier": "basic"}))
        .await
        .assert_status_ok();

    let accepted = server
        .post("/api/concierge/request/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .json(&request)
        .await;
    accepted.assert_status(StatusCode::CREATED);
    let request_id = accepted.json::<Value>()["request"]["id"].as_u64().unwrap();

    let cancelled = server
        .post(&format!("/api/concierge/requests/{}/cancel/", request_id))
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await;
    cancelled.assert_status_ok();
    assert_eq!(cancelled.json::<Value>()["request"]["status"], "cancelled");

    let dashboard: Value = server
        .get("/api/concierge/")
        .add_header(header::AUTHORIZATION, bearer(&access))
        .await
        .json();
    assert_eq!(dashboard["success"], true);
}

// =============================================================================
// RATE LIMITING
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let (server, _) = create_server_with(AppConfig {
        rate_limit: 1,
        ..test_config()
    });

    let mut limited = false;
    for _ in 0..5 {
        if server.get("/health").await.status_code() == StatusCode::TOO_MANY_REQUESTS {
            limited = true;
            break;
        }
    }
    assert!(limited);
}
