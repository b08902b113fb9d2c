//! # velora-core
//!
//! Domain records and business rules for the VELORA wellness platform - THE LOGIC.
//!
//! This crate owns every rule of the platform: account and OTP handling,
//! three-step registration, token issuance, subscription entitlements,
//! specialist booking, concierge workflows, and wellness plan tracking.
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Never reads the clock: operations take `now` from the caller
//! - Every operation runs inside a `Store` transaction handed in by the caller,
//!   so multi-step flows commit or fail as a unit
//! - Never logs; the binary decides what is worth reporting

// =============================================================================
// MODULES
// =============================================================================

pub mod accounts;
pub mod concierge;
pub mod otp;
pub mod plans;
pub mod platform;
pub mod primitives;
pub mod registration;
pub mod specialists;
pub mod storage;
pub mod subscriptions;
pub mod tokens;
pub mod types;
pub mod validate;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    ActivityLevel, ActivityType, AppointmentStatus, AppointmentType, Attributes, BillingCycle,
    DifficultyLevel, FaqCategory, FitnessLevel, Gender, Metrics, ModuleType, NoteType,
    NotificationType, OtpErrorCode, OtpPurpose, PlanStatus, PlanType, PrimaryGoal, Priority,
    RegistrationStatus, RequestStatus, ServiceCategory, SessionStatus, SpecialistCategoryKind,
    SubscriptionStatus, TierLevel, VeloraError, WeeklySchedule,
};

pub use types::{
    ActivityId, AgentId, AppointmentId, AvailabilityId, CategoryId, FaqId, ModuleId, NoteId,
    NotificationId, OtpId, PlanId, PlanSessionId, ProgressId, RegistrationId, RequestId,
    ReviewId, ServiceId, SpecialistId, SubscriptionId, TierId, UserId,
};

// =============================================================================
// RE-EXPORTS: Storage & Services
// =============================================================================

pub use accounts::{User, UserProfile};
pub use otp::{EmailOtp, OtpEmail, OtpPolicy};
pub use registration::RegistrationSession;
pub use storage::{Reader, Store, WriteTx};
pub use subscriptions::{Entitlements, SubscriptionTier, UserSubscription};
pub use tokens::{TokenIssuer, TokenKind, TokenPair};
