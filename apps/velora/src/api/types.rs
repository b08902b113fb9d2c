//! # API Types
//!
//! Request bodies specific to the HTTP layer, and response views over core
//! records. Operation inputs that the core already defines (`NewPlan`,
//! `NewRequest`, ...) are deserialized directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use velora_core::accounts::UserProfile;
use velora_core::{
    AgentId, AppointmentStatus, BillingCycle, FitnessLevel, Gender, NotificationId, OtpPurpose,
    TierLevel, User, UserId,
};

// =============================================================================
// AUTH REQUESTS
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpLoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default = "registration_purpose")]
    pub purpose: OtpPurpose,
}

const fn registration_purpose() -> OtpPurpose {
    OtpPurpose::Registration
}

// =============================================================================
// OTHER REQUESTS
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub tier: TierLevel,
    #[serde(default = "monthly")]
    pub billing_cycle: BillingCycle,
}

const fn monthly() -> BillingCycle {
    BillingCycle::Monthly
}

/// Without ids, every unread notification is marked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarkReadRequest {
    pub notification_ids: Option<Vec<NotificationId>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub agent: AgentId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentStatusRequest {
    pub status: AppointmentStatus,
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Public view of an account. Never includes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub bio: String,
    pub fitness_level: Option<FitnessLevel>,
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub email_verified: bool,
    pub onboarded: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            phone_number: user.phone_number.clone(),
            date_of_birth: user.date_of_birth,
            gender: user.gender,
            bio: user.bio.clone(),
            fitness_level: user.fitness_level,
            email_notifications: user.email_notifications,
            sms_notifications: user.sms_notifications,
            email_verified: user.email_verified,
            onboarded: user.onboarded,
            last_login: user.last_login,
            date_joined: user.created_at,
        }
    }
}

/// Account plus profile, as returned by the profile endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: UserView,
    pub age: Option<i32>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub profile: UserProfile,
}

impl ProfileView {
    pub fn new(user: &User, profile: UserProfile, today: NaiveDate) -> Self {
        Self {
            user: UserView::from(user),
            age: user.age(today),
            height_cm: user.height_cm,
            weight_kg: user.weight_kg,
            profile,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resend_defaults_to_registration() {
        let request: ResendRequest =
            serde_json::from_str(r#"{"email":"a@example.com"}"#).expect("parse");
        assert_eq!(request.purpose, OtpPurpose::Registration);

        let request: ResendRequest =
            serde_json::from_str(r#"{"email":"a@example.com","purpose":"login"}"#).expect("parse");
        assert_eq!(request.purpose, OtpPurpose::Login);
    }

    #[test]
    fn mark_read_without_ids_means_all() {
        let request: MarkReadRequest = serde_json::from_str("{}").expect("parse");
        assert!(request.notification_ids.is_none());
    }

    #[test]
    fn subscribe_defaults_to_monthly() {
        let request: SubscribeRequest =
            serde_json::from_str(r#"{"tier":"premium"}"#).expect("parse");
        assert_eq!(request.tier, TierLevel::Premium);
        assert_eq!(request.billing_cycle, BillingCycle::Monthly);
    }
}
