//! # Account Flow Tests
//!
//! End-to-end checks of sign-up, OTP handling, and uniqueness rules through
//! the public API, each against a fresh in-memory store.

use chrono::{DateTime, Duration, Utc};
use velora_core::registration::{self, CompleteRegistration};
use velora_core::{OtpErrorCode, OtpPolicy, OtpPurpose, RegistrationStatus, Store, VeloraError, otp};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn otp_code(err: &VeloraError) -> Option<OtpErrorCode> {
    match err {
        VeloraError::Otp { code, .. } => Some(*code),
        _ => None,
    }
}

/// Runs the full three-step sign-up and returns the new user's id.
fn register(store: &Store, email: &str) -> velora_core::UserId {
    let policy = OtpPolicy::default();
    let (session, code) = store
        .write(|tx| registration::initiate(tx, &policy, email, t0()))
        .expect("initiate");
    let verified = store
        .write(|tx| registration::verify(tx, email, &code.code, &session.session_id, t0()))
        .expect("verify")
        .expect("accepted");
    store
        .write(|tx| {
            registration::complete(
                tx,
                CompleteRegistration {
                    session_id: verified.session_id.clone(),
                    password: "password123".to_string(),
                    confirm_password: Some("password123".to_string()),
                    first_name: "Jane".to_string(),
                    last_name: "Doe".to_string(),
                },
                t0(),
            )
        })
        .expect("complete")
        .id
}

// =============================================================================
// REGISTRATION
// =============================================================================

mod registration_flow {
    use super::*;

    #[test]
    fn full_sign_up_creates_verified_user() {
        let store = Store::in_memory().expect("store");
        let id = register(&store, "Jane@Example.com");
        let user = store
            .read(|tx| velora_core::accounts::get(tx, id))
            .expect("user");
        assert_eq!(user.email, "jane@example.com");
        assert!(user.email_verified);
        assert_eq!(user.full_name(), "Jane Doe");
    }

    #[test]
    fn existing_email_is_rejected() {
        let store = Store::in_memory().expect("store");
        register(&store, "jane@example.com");
        let err = store.write(|tx| {
            registration::initiate(tx, &OtpPolicy::default(), "jane@example.com", t0())
        });
        assert!(matches!(err, Err(VeloraError::Conflict(_))));
    }

    #[test]
    fn completing_before_verification_fails() {
        let store = Store::in_memory().expect("store");
        let (session, _) = store
            .write(|tx| {
                registration::initiate(tx, &OtpPolicy::default(), "jane@example.com", t0())
            })
            .expect("initiate");
        assert_eq!(session.status, RegistrationStatus::EmailSent);
        let err = store
            .write(|tx| {
                registration::complete(
                    tx,
                    CompleteRegistration {
                        session_id: session.session_id.clone(),
                        password: "password123".to_string(),
                        ..CompleteRegistration::default()
                    },
                    t0(),
                )
            })
            .expect_err("unverified");
        assert_eq!(
            err.to_string(),
            "Email not verified. Please verify your OTP first."
        );
    }

    #[test]
    fn expired_session_cannot_be_verified() {
        let store = Store::in_memory().expect("store");
        let (session, code) = store
            .write(|tx| {
                registration::initiate(tx, &OtpPolicy::default(), "jane@example.com", t0())
            })
            .expect("initiate");
        let later = t0() + Duration::hours(25);
        let verdict = store
            .write(|tx| {
                registration::verify(tx, "jane@example.com", &code.code, &session.session_id, later)
            })
            .expect("committed");
        assert_eq!(
            verdict.expect_err("expired").to_string(),
            "Registration session expired"
        );
    }
}

// =============================================================================
// OTP
// =============================================================================

#[allow(clippy::panic)]
mod otp_rules {
    use super::*;

    #[test]
    fn expired_otp_cannot_be_verified() {
        let store = Store::in_memory().expect("store");
        let policy = OtpPolicy::default();
        let code = store
            .write(|tx| otp::issue(tx, &policy, "jane@example.com", OtpPurpose::Login, t0()))
            .expect("issue");
        let later = t0() + Duration::minutes(11);
        let err = store
            .write(|tx| otp::verify(tx, "jane@example.com", &code.code, OtpPurpose::Login, later))
            .expect("committed")
            .expect_err("expired");
        assert_eq!(otp_code(&err), Some(OtpErrorCode::OtpExpired));
    }

    #[test]
    fn attempts_are_capped_and_persisted() {
        let store = Store::in_memory().expect("store");
        let policy = OtpPolicy::default();
        let code = store
            .write(|tx| otp::issue(tx, &policy, "jane@example.com", OtpPurpose::Login, t0()))
            .expect("issue");

        for remaining in [2, 1, 0] {
            let err = store
                .write(|tx| otp::verify(tx, "jane@example.com", "000000x", OtpPurpose::Login, t0()))
                .expect("committed")
                .expect_err("wrong code");
            match err {
                VeloraError::Otp {
                    code: OtpErrorCode::InvalidOtp,
                    remaining_attempts,
                    ..
                } => assert_eq!(remaining_attempts, Some(remaining)),
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let err = store
            .write(|tx| otp::verify(tx, "jane@example.com", &code.code, OtpPurpose::Login, t0()))
            .expect("committed")
            .expect_err("locked");
        assert_eq!(otp_code(&err), Some(OtpErrorCode::MaxAttemptsExceeded));
    }

    #[test]
    fn used_otp_is_reported_as_used() {
        let store = Store::in_memory().expect("store");
        let policy = OtpPolicy::default();
        let code = store
            .write(|tx| otp::issue(tx, &policy, "jane@example.com", OtpPurpose::Login, t0()))
            .expect("issue");
        store
            .write(|tx| otp::verify(tx, "jane@example.com", &code.code, OtpPurpose::Login, t0()))
            .expect("committed")
            .expect("accepted");
        let err = store
            .write(|tx| otp::verify(tx, "jane@example.com", &code.code, OtpPurpose::Login, t0()))
            .expect("committed")
            .expect_err("reused");
        assert_eq!(otp_code(&err), Some(OtpErrorCode::OtpAlreadyUsed));
    }
}

// =============================================================================
// UNIQUENESS
// =============================================================================

mod uniqueness {
    use super::*;
    use velora_core::specialists::{self, NewReview, NewSpecialist};
    use velora_core::{TierLevel, WeeklySchedule};

    #[test]
    fn usernames_stay_unique_for_shared_local_parts() {
        let store = Store::in_memory().expect("store");
        let a = register(&store, "jane@example.com");
        let b = register(&store, "jane@example.org");
        let (ua, ub) = store
            .read(|tx| {
                Ok((
                    velora_core::accounts::get(tx, a)?,
                    velora_core::accounts::get(tx, b)?,
                ))
            })
            .expect("users");
        assert_ne!(ua.username, ub.username);
    }

    #[test]
    fn one_review_per_client_and_specialist() {
        let store = Store::in_memory().expect("store");
        let client = register(&store, "client@example.com");
        let pro = register(&store, "pro@example.com");
        let review = || NewReview {
            rating: 5,
            title: "Great".to_string(),
            review_text: "Very helpful".to_string(),
            professionalism: 5,
            expertise: 5,
            communication: 4,
            results: 5,
            is_public: true,
        };
        let result = store.write(|tx| {
            let specialist = specialists::create_specialist(
                tx,
                NewSpecialist {
                    user: pro,
                    categories: Vec::new(),
                    title: "Coach".to_string(),
                    professional_summary: "Strength coach".to_string(),
                    years_experience: 6,
                    tier: TierLevel::Premium,
                    certifications: String::new(),
                    education: String::new(),
                    specializations: String::new(),
                    hourly_rate_cents: 10_000,
                    consultation_rate_cents: 5_000,
                    available_hours: WeeklySchedule::new(),
                    timezone: "UTC".to_string(),
                    is_verified: true,
                    is_featured: false,
                },
                t0(),
            )?;
            specialists::submit_review(tx, client, specialist.id, review(), t0())?;
            specialists::submit_review(tx, client, specialist.id, review(), t0())
        });
        assert!(matches!(result, Err(VeloraError::Conflict(_))));
    }
}
