//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the platform:
//! - Record identifiers (`UserId`, `PlanId`, ...)
//! - Choice enums for every constrained string field
//! - Loosely structured attribute maps
//! - Error types (`VeloraError`, `OtpErrorCode`)
//!
//! ## Encoding Guarantees
//!
//! All types in this module:
//! - Serialize the same way in JSON (API) and postcard (storage)
//! - Use `BTreeMap` for embedded maps so encodings are stable
//! - Carry no floating-point arithmetic (floats are stored, never computed)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// RECORD IDENTIFIERS
// =============================================================================

macro_rules! record_ids {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
                Default,
            )]
            #[serde(transparent)]
            pub struct $name(pub u64);

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

record_ids! {
    /// Identifier of a platform account.
    UserId,
    /// Identifier of an email one-time password.
    OtpId,
    /// Identifier of a pending registration.
    RegistrationId,
    /// Identifier of a subscription tier.
    TierId,
    /// Identifier of a user subscription.
    SubscriptionId,
    NotificationId,
    ActivityId,
    FaqId,
    CategoryId,
    /// Identifier of a specialist profile (not the specialist's user account).
    SpecialistId,
    ReviewId,
    AvailabilityId,
    /// Identifier of a concierge agent profile (not the agent's user account).
    AgentId,
    ServiceId,
    RequestId,
    AppointmentId,
    NoteId,
    PlanId,
    ModuleId,
    PlanSessionId,
    ProgressId,
}

// =============================================================================
// LOOSELY STRUCTURED FIELDS
// =============================================================================

/// Free-form string attributes (goals, personalization factors, links).
pub type Attributes = BTreeMap<String, String>;

/// Named numeric measurements (strength, endurance, target metrics).
pub type Metrics = BTreeMap<String, f64>;

/// Weekly schedule: weekday name -> list of `"HH:MM-HH:MM"` ranges.
pub type WeeklySchedule = BTreeMap<String, Vec<String>>;

// =============================================================================
// CHOICE ENUMS
// =============================================================================

/// Declares a choice enum with its wire name and human label.
///
/// Every choice enum gets `ALL`, `as_str`, `display_name`, `Display` and a
/// `FromStr` that reports unknown values as validation errors.
macro_rules! choices {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => ($wire:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        $vis enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire name used in JSON and URLs.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            /// Human readable label.
            #[must_use]
            pub const fn display_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = VeloraError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|choice| choice.as_str() == s)
                    .ok_or_else(|| {
                        VeloraError::Validation(format!(
                            "'{}' is not a valid {}",
                            s,
                            stringify!($name)
                        ))
                    })
            }
        }
    };
}

choices! {
    pub enum Gender {
        Male => ("M", "Male"),
        Female => ("F", "Female"),
        Other => ("O", "Other"),
        PreferNotToSay => ("P", "Prefer not to say"),
    }
}

choices! {
    pub enum FitnessLevel {
        Beginner => ("beginner", "Beginner"),
        Intermediate => ("intermediate", "Intermediate"),
        Advanced => ("advanced", "Advanced"),
    }
}

choices! {
    pub enum PrimaryGoal {
        LoseWeight => ("lose_weight", "Lose Weight"),
        GainWeight => ("gain_weight", "Gain Weight"),
        MaintainWeight => ("maintain_weight", "Maintain Weight"),
        BuildMuscle => ("build_muscle", "Build Muscle"),
        ImproveEndurance => ("improve_endurance", "Improve Endurance"),
        StressRelief => ("stress_relief", "Stress Relief"),
        GeneralFitness => ("general_fitness", "General Fitness"),
    }
}

choices! {
    pub enum ActivityLevel {
        Sedentary => ("sedentary", "Sedentary (little/no exercise)"),
        LightlyActive => ("lightly_active", "Lightly Active (light exercise 1-3 days/week)"),
        ModeratelyActive => ("moderately_active", "Moderately Active (moderate exercise 3-5 days/week)"),
        VeryActive => ("very_active", "Very Active (hard exercise 6-7 days/week)"),
        ExtremelyActive => ("extremely_active", "Extremely Active (very hard exercise, physical job)"),
    }
}

choices! {
    /// What an email OTP is for. OTPs of different purposes never satisfy each other.
    pub enum OtpPurpose {
        Registration => ("registration", "Registration"),
        Login => ("login", "Login"),
        PasswordReset => ("password_reset", "Password Reset"),
        EmailVerification => ("email_verification", "Email Verification"),
    }
}

choices! {
    /// Progress of a three-step registration.
    pub enum RegistrationStatus {
        Initiated => ("initiated", "Initiated"),
        EmailSent => ("email_sent", "Email Sent"),
        EmailVerified => ("email_verified", "Email Verified"),
        Completed => ("completed", "Completed"),
        Expired => ("expired", "Expired"),
    }
}

choices! {
    /// Membership level. Declaration order is the gating order.
    pub enum TierLevel {
        Basic => ("basic", "Basic"),
        Premium => ("premium", "Premium"),
        Platinum => ("platinum", "Platinum"),
        Diamond => ("diamond", "Diamond"),
    }
}

choices! {
    pub enum SubscriptionStatus {
        Active => ("active", "Active"),
        Paused => ("paused", "Paused"),
        Cancelled => ("cancelled", "Cancelled"),
        Expired => ("expired", "Expired"),
        Trial => ("trial", "Trial"),
    }
}

choices! {
    pub enum BillingCycle {
        Monthly => ("monthly", "Monthly"),
        Annual => ("annual", "Annual"),
    }
}

choices! {
    pub enum NotificationType {
        Info => ("info", "Information"),
        Success => ("success", "Success"),
        Warning => ("warning", "Warning"),
        Error => ("error", "Error"),
        Reminder => ("reminder", "Reminder"),
        Achievement => ("achievement", "Achievement"),
        Update => ("update", "Update"),
    }
}

choices! {
    pub enum ActivityType {
        Login => ("login", "User Login"),
        Logout => ("logout", "User Logout"),
        ProfileUpdate => ("profile_update", "Profile Update"),
        PlanCreated => ("plan_created", "Wellness Plan Created"),
        SessionCompleted => ("session_completed", "Session Completed"),
        SpecialistBooked => ("specialist_booked", "Specialist Booked"),
        ConciergeRequest => ("concierge_request", "Concierge Request"),
        SubscriptionChange => ("subscription_change", "Subscription Change"),
        AchievementUnlocked => ("achievement_unlocked", "Achievement Unlocked"),
        ReviewSubmitted => ("review_submitted", "Review Submitted"),
    }
}

choices! {
    pub enum FaqCategory {
        General => ("general", "General"),
        Subscription => ("subscription", "Subscription"),
        Specialists => ("specialists", "Specialists"),
        WellnessPlans => ("wellness_plans", "Wellness Plans"),
        Concierge => ("concierge", "Concierge Services"),
        Billing => ("billing", "Billing"),
        Technical => ("technical", "Technical Support"),
    }
}

choices! {
    pub enum SpecialistCategoryKind {
        Fitness => ("fitness", "Fitness & Training"),
        Nutrition => ("nutrition", "Nutrition & Dietetics"),
        Longevity => ("longevity", "Longevity & Anti-aging"),
        MentalHealth => ("mental_health", "Mental Health & Wellness"),
        Physiotherapy => ("physiotherapy", "Physiotherapy & Recovery"),
        Alternative => ("alternative", "Alternative Medicine"),
        Coaching => ("coaching", "Life & Performance Coaching"),
    }
}

choices! {
    pub enum ServiceCategory {
        Scheduling => ("scheduling", "Appointment Scheduling"),
        Coordination => ("coordination", "Specialist Coordination"),
        Planning => ("planning", "Wellness Plan Management"),
        Lifestyle => ("lifestyle", "Lifestyle Concierge"),
        Emergency => ("emergency", "Emergency Support"),
        Consultation => ("consultation", "Consultation Services"),
        Travel => ("travel", "Wellness Travel Planning"),
        Nutrition => ("nutrition", "Meal Planning & Delivery"),
        Fitness => ("fitness", "Fitness Equipment & Setup"),
        Wellness => ("wellness", "General Wellness Support"),
    }
}

choices! {
    pub enum RequestStatus {
        Submitted => ("submitted", "Submitted"),
        Assigned => ("assigned", "Assigned"),
        InProgress => ("in_progress", "In Progress"),
        PendingApproval => ("pending_approval", "Pending Approval"),
        Completed => ("completed", "Completed"),
        Cancelled => ("cancelled", "Cancelled"),
        OnHold => ("on_hold", "On Hold"),
    }
}

choices! {
    pub enum Priority {
        Low => ("low", "Low"),
        Normal => ("normal", "Normal"),
        High => ("high", "High"),
        Urgent => ("urgent", "Urgent"),
        Emergency => ("emergency", "Emergency"),
    }
}

choices! {
    pub enum AppointmentType {
        SpecialistConsultation => ("specialist_consultation", "Specialist Consultation"),
        WellnessSession => ("wellness_session", "Wellness Session"),
        HealthScreening => ("health_screening", "Health Screening"),
        FitnessAssessment => ("fitness_assessment", "Fitness Assessment"),
        NutritionConsultation => ("nutrition_consultation", "Nutrition Consultation"),
        LifestylePlanning => ("lifestyle_planning", "Lifestyle Planning"),
        FollowUp => ("follow_up", "Follow-up Session"),
    }
}

choices! {
    pub enum AppointmentStatus {
        Scheduled => ("scheduled", "Scheduled"),
        Confirmed => ("confirmed", "Confirmed"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Cancelled => ("cancelled", "Cancelled"),
        NoShow => ("no_show", "No Show"),
        Rescheduled => ("rescheduled", "Rescheduled"),
    }
}

choices! {
    pub enum NoteType {
        General => ("general", "General Note"),
        ClientPreference => ("client_preference", "Client Preference"),
        FollowUp => ("follow_up", "Follow-up Required"),
        Escalation => ("escalation", "Escalation"),
        Achievement => ("achievement", "Client Achievement"),
        Concern => ("concern", "Concern"),
        Recommendation => ("recommendation", "Recommendation"),
    }
}

choices! {
    pub enum PlanType {
        Comprehensive => ("comprehensive", "Comprehensive Wellness"),
        Fitness => ("fitness", "Fitness Focus"),
        Nutrition => ("nutrition", "Nutrition Focus"),
        MentalWellness => ("mental_wellness", "Mental Wellness"),
        Longevity => ("longevity", "Longevity & Anti-aging"),
        Recovery => ("recovery", "Recovery & Rehabilitation"),
        Performance => ("performance", "Performance Optimization"),
    }
}

choices! {
    pub enum DifficultyLevel {
        Beginner => ("beginner", "Beginner"),
        Intermediate => ("intermediate", "Intermediate"),
        Advanced => ("advanced", "Advanced"),
        Expert => ("expert", "Expert"),
    }
}

choices! {
    pub enum PlanStatus {
        Draft => ("draft", "Draft"),
        Active => ("active", "Active"),
        Paused => ("paused", "Paused"),
        Completed => ("completed", "Completed"),
        Cancelled => ("cancelled", "Cancelled"),
    }
}

choices! {
    pub enum ModuleType {
        Fitness => ("fitness", "Fitness Training"),
        Nutrition => ("nutrition", "Nutrition Plan"),
        Mindfulness => ("mindfulness", "Mindfulness & Meditation"),
        Recovery => ("recovery", "Recovery & Rest"),
        Lifestyle => ("lifestyle", "Lifestyle Changes"),
        Supplementation => ("supplementation", "Supplementation"),
        Monitoring => ("monitoring", "Health Monitoring"),
    }
}

choices! {
    pub enum SessionStatus {
        Scheduled => ("scheduled", "Scheduled"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Skipped => ("skipped", "Skipped"),
        Cancelled => ("cancelled", "Cancelled"),
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Machine readable reason attached to OTP verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpErrorCode {
    OtpNotFound,
    OtpExpired,
    MaxAttemptsExceeded,
    InvalidOtp,
    OtpAlreadyUsed,
}

impl OtpErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OtpNotFound => "OTP_NOT_FOUND",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::MaxAttemptsExceeded => "MAX_ATTEMPTS_EXCEEDED",
            Self::InvalidOtp => "INVALID_OTP",
            Self::OtpAlreadyUsed => "OTP_ALREADY_USED",
        }
    }
}

/// Errors that can occur in the VELORA core.
///
/// - Messages of the client-facing variants are shown to end users verbatim
/// - Storage and serialization details never reach API clients
#[derive(Debug, Error)]
pub enum VeloraError {
    /// Input failed a field or business rule.
    #[error("{0}")]
    Validation(String),

    /// The requested record does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness rule would be violated.
    #[error("{0}")]
    Conflict(String),

    /// Credentials are missing, wrong, or expired.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller is authenticated but not entitled.
    #[error("{0}")]
    Forbidden(String),

    /// OTP verification failed.
    #[error("{message}")]
    Otp {
        code: OtpErrorCode,
        message: String,
        remaining_attempts: Option<u32>,
    },

    /// The embedded database failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Anything else (hashing, token signing).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VeloraError {
    /// Shorthand for a validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the error is caused by the client rather than the server.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Storage(_) | Self::Serialization(_) | Self::Internal(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_levels_are_ordered() {
        assert!(TierLevel::Basic < TierLevel::Premium);
        assert!(TierLevel::Premium < TierLevel::Platinum);
        assert!(TierLevel::Platinum < TierLevel::Diamond);
    }

    #[test]
    fn choice_parses_wire_name() {
        let parsed: PlanType = "mental_wellness".parse().expect("parse");
        assert_eq!(parsed, PlanType::MentalWellness);
        assert_eq!(parsed.display_name(), "Mental Wellness");
    }

    #[test]
    fn choice_rejects_unknown_value() {
        let err = "gold".parse::<TierLevel>().expect_err("should fail");
        assert!(matches!(err, VeloraError::Validation(_)));
    }

    #[test]
    fn choice_wire_name_differs_from_label() {
        assert_eq!(Gender::PreferNotToSay.as_str(), "P");
        assert_eq!(Gender::PreferNotToSay.to_string(), "P");
        assert_eq!(Gender::PreferNotToSay.display_name(), "Prefer not to say");
    }

    #[test]
    fn not_found_message_names_kind() {
        let err = VeloraError::NotFound("Specialist");
        assert_eq!(err.to_string(), "Specialist not found");
        assert!(err.is_client_error());
        assert!(!VeloraError::Storage("disk".into()).is_client_error());
    }

    #[test]
    fn record_ids_round_trip_through_postcard() {
        let bytes = postcard::to_allocvec(&UserId(42)).expect("encode");
        let id: UserId = postcard::from_bytes(&bytes).expect("decode");
        assert_eq!(id, UserId(42));
    }
}
