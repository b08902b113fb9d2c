//! # Platform Primitives
//!
//! Fixed limits and defaults for the VELORA core.
//!
//! Values that operators may tune (OTP expiry, token lifetimes) have a
//! default here and an override in the binary's configuration. Field limits
//! are not configurable: they describe the record layout.

// =============================================================================
// OTP & REGISTRATION
// =============================================================================

/// Number of digits in an email OTP.
pub const OTP_CODE_LENGTH: usize = 6;

/// Default OTP lifetime in minutes.
pub const OTP_EXPIRY_MINUTES: i64 = 10;

/// Longest configurable OTP lifetime in minutes (one day).
pub const MAX_OTP_EXPIRY_MINUTES: i64 = 24 * 60;

/// Default number of verification attempts per OTP.
pub const OTP_MAX_ATTEMPTS: u32 = 3;

/// Lifetime of a registration session in hours.
pub const REGISTRATION_SESSION_HOURS: i64 = 24;

/// Length of a registration session identifier (hex characters).
pub const SESSION_ID_LENGTH: usize = 32;

// =============================================================================
// TOKENS
// =============================================================================

/// Default access token lifetime in minutes.
pub const ACCESS_TOKEN_MINUTES: i64 = 60;

/// Default refresh token lifetime in days.
pub const REFRESH_TOKEN_DAYS: i64 = 7;

/// Longest configurable access token lifetime in minutes (one day).
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 24 * 60;

/// Longest configurable refresh token lifetime in days.
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 365;

// =============================================================================
// FIELD LIMITS
// =============================================================================

/// Minimum password length at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum length of first and last names.
pub const MAX_NAME_LENGTH: usize = 30;

/// Maximum length of a phone number.
pub const MAX_PHONE_LENGTH: usize = 15;

/// Maximum length of a user bio.
pub const MAX_BIO_LENGTH: usize = 500;

/// Maximum length of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length of titles (plans, requests, reviews, notifications).
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length of a budget range description.
pub const MAX_BUDGET_RANGE_LENGTH: usize = 100;

/// Ratings given to specialists, requests and sessions.
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Self-reported wellness scales (energy, sleep, stress, mood).
pub const WELLNESS_SCALE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Upper bound on sessions per week in a wellness plan.
pub const MAX_SESSIONS_PER_WEEK: u32 = 14;

/// Upper bound on a wellness plan's length (ten years).
pub const MAX_PLAN_WEEKS: u32 = 520;

// =============================================================================
// LISTING LIMITS
// =============================================================================

/// Public reviews shown on a specialist's detail page.
pub const DETAIL_REVIEW_LIMIT: usize = 10;

/// Progress entries shown on a plan's progress page.
pub const PROGRESS_HISTORY_LIMIT: usize = 30;

/// Activity entries shown on a user's profile.
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Items shown per section of the concierge dashboard.
pub const DASHBOARD_LIMIT: usize = 5;

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// Days in a monthly billing period.
pub const MONTHLY_PERIOD_DAYS: i64 = 30;

/// Days in an annual billing period.
pub const ANNUAL_PERIOD_DAYS: i64 = 365;

/// Longest free trial an operator may configure.
pub const MAX_TRIAL_PERIOD_DAYS: u32 = 365;

/// Wellness plans a user without an active subscription may keep open.
pub const FREE_MAX_WELLNESS_PLANS: u32 = 1;

/// Default AI model label stamped on new wellness plans.
pub const DEFAULT_AI_MODEL_VERSION: &str = "v1.0";

/// Username given to the development demo account.
pub const DEMO_USERNAME: &str = "demo_user";

/// Email of the development demo account.
pub const DEMO_EMAIL: &str = "demo@example.com";
