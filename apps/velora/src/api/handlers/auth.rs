//! Registration, login, token, and profile endpoints under `/api/auth/`.

use super::{blocking, now, optional_json, required};
use crate::api::AppState;
use crate::api::auth::AuthUser;
use crate::api::error::{ApiError, ApiJson, ApiResult, created, ok};
use crate::api::types::{
    LoginRequest, LogoutRequest, OtpLoginRequest, ProfileView, RefreshRequest, RegisterRequest,
    ResendRequest, UserView, VerifyRequest,
};
use crate::mailer::{OutgoingEmail, deliver};
use axum::{body::Bytes, extract::State};
use std::sync::Arc;
use serde_json::json;
use velora_core::accounts::{self, ProfileUpdate};
use velora_core::primitives::RECENT_ACTIVITY_LIMIT;
use velora_core::registration::{self, CompleteRegistration};
use velora_core::{
    ActivityType, Attributes, EmailOtp, OtpEmail, OtpPurpose, User, VeloraError, WriteTx, otp,
    platform,
};

fn send_otp(state: &AppState, code: &EmailOtp) {
    let email = OtpEmail::for_otp(code, &state.config.otp_policy());
    deliver(
        state.mailer.as_ref(),
        &OutgoingEmail::from_otp(&state.config.mail_from, email),
    );
}

fn log_activity(
    tx: &WriteTx,
    user: &User,
    activity: ActivityType,
    description: &str,
) -> Result<(), VeloraError> {
    platform::record_activity(
        tx,
        user.id,
        activity,
        description,
        Attributes::new(),
        now(),
    )
    .map(|_| ())
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// Step 1: email in, OTP out.
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult {
    required(&request.email, "Email is required")?;
    let policy = state.config.otp_policy();
    let (session, code) = state
        .store
        .write(|tx| registration::initiate(tx, &policy, &request.email, now()))?;

    send_otp(&state, &code);
    tracing::info!(email = %session.email, "Registration initiated");

    ok(json!({
        "message": "OTP sent to your email",
        "session_id": session.session_id,
    }))
}

/// Step 2: check the code. Returns the session id to use for step 3.
pub async fn verify_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyRequest>,
) -> ApiResult {
    let session = state.store.write(|tx| {
        registration::verify(tx, &request.email, &request.otp, &request.session_id, now())
    })??;

    tracing::info!(email = %session.email, "Registration email verified");
    ok(json!({
        "message": "OTP verified successfully",
        "session_id": session.session_id,
    }))
}

/// Step 3: set the password and create the account.
pub async fn complete_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CompleteRegistration>,
) -> ApiResult {
    let store = Arc::clone(&state.store);
    let user =
        blocking(move || store.write(|tx| registration::complete(tx, request, now()))).await?;
    let tokens = state.tokens.issue_pair(user.id, now())?;

    tracing::info!(user = user.id.0, "User registered");
    created(json!({
        "message": "User registered successfully",
        "user": UserView::from(&user),
        "tokens": tokens,
    }))
}

/// Issue a fresh code for any purpose.
pub async fn resend_otp_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResendRequest>,
) -> ApiResult {
    required(&request.email, "Email is required")?;
    let policy = state.config.otp_policy();
    let code = state.store.write(|tx| {
        registration::resend(tx, &policy, &request.email, request.purpose, now())
    })?;

    send_otp(&state, &code);

    if state.config.expose_debug_otp {
        tracing::warn!(email = %code.email, "Returning OTP in response body (expose_debug_otp)");
        ok(json!({
            "message": "OTP resent to your email",
            "debug_info": {
                "otp_generated": true,
                "otp_value": code.code,
            },
        }))
    } else {
        ok(json!({"message": "OTP resent to your email"}))
    }
}

// =============================================================================
// LOGIN & TOKENS
// =============================================================================

pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError(VeloraError::invalid(
            "Email and password are required",
        )));
    }

    let store = Arc::clone(&state.store);
    let user = blocking(move || {
        store.write(|tx| {
            let user = accounts::authenticate(tx, &request.email, &request.password, now())?;
            log_activity(tx, &user, ActivityType::Login, "Logged in with password")?;
            Ok(user)
        })
    })
    .await
    .inspect_err(|e| {
        if matches!(e, VeloraError::Unauthorized(_)) {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_credentials",
                "Password login failed"
            );
        }
    })?;
    let tokens = state.tokens.issue_pair(user.id, now())?;

    ok(json!({
        "message": "Login successful",
        "user": UserView::from(&user),
        "tokens": tokens,
    }))
}

/// Log in with a code issued by `resend-otp/` with purpose `login`.
pub async fn otp_login_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<OtpLoginRequest>,
) -> ApiResult {
    if request.email.trim().is_empty() || request.otp.trim().is_empty() {
        return Err(ApiError(VeloraError::invalid("Email and OTP are required")));
    }
    let email = request.email.trim().to_lowercase();

    let user = state.store.write(|tx| {
        if let Err(rejected) = otp::verify(tx, &email, request.otp.trim(), OtpPurpose::Login, now())? {
            return Ok(Err(rejected));
        }
        let mut user = accounts::find_by_email(tx, &email)?.ok_or(VeloraError::NotFound("User"))?;
        accounts::touch_login(tx, &mut user, now())?;
        log_activity(tx, &user, ActivityType::Login, "Logged in with OTP")?;
        Ok(Ok(user))
    })??;
    let tokens = state.tokens.issue_pair(user.id, now())?;

    ok(json!({
        "message": "Login successful",
        "user": UserView::from(&user),
        "tokens": tokens,
    }))
}

/// Revokes the refresh token when one is sent.
pub async fn logout_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> ApiResult {
    let request: LogoutRequest = optional_json(&body)?;
    state.store.write(|tx| {
        if let Some(refresh) = request.refresh.as_deref().filter(|r| !r.trim().is_empty()) {
            state.tokens.revoke(tx, refresh, now())?;
        }
        log_activity(tx, &user, ActivityType::Logout, "Logged out")
    })?;

    ok(json!({"message": "Logout successful"}))
}

/// Exchange a refresh token for a new pair. The old refresh token is revoked.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> ApiResult {
    required(&request.refresh, "Refresh token is required")?;
    let tokens = state
        .store
        .write(|tx| state.tokens.refresh(tx, &request.refresh, now()))?;

    ok(json!({
        "message": "Token refreshed",
        "tokens": tokens,
    }))
}

/// Development shortcut: log in as the demo account. Mounted only when
/// `demo_login` is enabled.
pub async fn demo_login_handler(State(state): State<AppState>) -> ApiResult {
    let user = state.store.write(|tx| {
        let mut user = accounts::demo_user(tx, now())?;
        accounts::touch_login(tx, &mut user, now())?;
        log_activity(tx, &user, ActivityType::Login, "Demo login")?;
        Ok(user)
    })?;
    let tokens = state.tokens.issue_pair(user.id, now())?;

    tracing::warn!(user = user.id.0, "Demo login used");
    ok(json!({
        "message": "Demo login successful",
        "user": UserView::from(&user),
        "tokens": tokens,
    }))
}

// =============================================================================
// PROFILE
// =============================================================================

pub async fn profile_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult {
    let (profile, activity) = state.store.read(|tx| {
        Ok((
            accounts::profile_of(tx, user.id)?,
            platform::activities_for(tx, user.id, RECENT_ACTIVITY_LIMIT)?,
        ))
    })?;
    ok(json!({
        "user": ProfileView::new(&user, profile, now().date_naive()),
        "recent_activity": activity,
    }))
}

pub async fn update_profile_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult {
    let (user, profile) = state.store.write(|tx| {
        let updated = accounts::update_profile(tx, user.id, update, now())?;
        log_activity(tx, &updated.0, ActivityType::ProfileUpdate, "Updated profile")?;
        Ok(updated)
    })?;

    ok(json!({
        "message": "Profile updated successfully",
        "user": ProfileView::new(&user, profile, now().date_naive()),
    }))
}

pub async fn complete_onboarding_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult {
    let user = state
        .store
        .write(|tx| accounts::complete_onboarding(tx, user.id, now()))?;

    ok(json!({
        "message": "Onboarding completed successfully",
        "user": UserView::from(&user),
    }))
}
