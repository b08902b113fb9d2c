//! # Registration
//!
//! Three-step sign-up:
//!
//! 1. `initiate`: open a session for an email and mail a registration OTP
//! 2. `verify`: check the OTP; the session id is rotated on success
//! 3. `complete`: set a password and create the account
//!
//! A session lives for 24 hours. Starting over for the same email replaces
//! the previous session.

use crate::accounts::{self, NewUser, User};
use crate::otp::{self, EmailOtp, OtpPolicy};
use crate::primitives::{MIN_PASSWORD_LENGTH, REGISTRATION_SESSION_HOURS};
use crate::storage::{Reader, WriteTx, impl_record};
use crate::types::{OtpPurpose, RegistrationId, RegistrationStatus, VeloraError};
use crate::{platform, validate};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sign-up in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSession {
    pub id: RegistrationId,
    /// 32 hex characters; changes when the email is verified.
    pub session_id: String,
    pub email: String,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl_record!(RegistrationSession, RegistrationId, "Registration session", "registration_sessions");

impl RegistrationSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn invalid_session() -> VeloraError {
    VeloraError::invalid("Invalid session")
}

fn session_expired() -> VeloraError {
    VeloraError::invalid("Registration session expired")
}

fn session_by_id(
    tx: &impl Reader,
    session_id: &str,
) -> Result<Option<RegistrationSession>, VeloraError> {
    tx.find::<RegistrationSession>(|s| s.session_id == session_id)
}

/// Open a registration for an email and issue its OTP.
pub fn initiate(
    tx: &WriteTx,
    policy: &OtpPolicy,
    raw_email: &str,
    now: DateTime<Utc>,
) -> Result<(RegistrationSession, EmailOtp), VeloraError> {
    let email = validate::email(raw_email)?;
    if accounts::email_taken(tx, &email)? {
        return Err(VeloraError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }
    if !platform::settings(tx)?.new_user_registrations {
        return Err(VeloraError::Forbidden(
            "New registrations are currently closed".to_string(),
        ));
    }

    tx.delete_where::<RegistrationSession>(|s| s.email == email)?;
    let mut session = RegistrationSession {
        id: RegistrationId::default(),
        session_id: new_session_id(),
        email: email.clone(),
        status: RegistrationStatus::Initiated,
        created_at: now,
        expires_at: now + Duration::hours(REGISTRATION_SESSION_HOURS),
    };
    tx.insert(&mut session)?;

    let code = otp::issue(tx, policy, &email, OtpPurpose::Registration, now)?;
    session.status = RegistrationStatus::EmailSent;
    tx.put(&session)?;
    Ok((session, code))
}

/// Check the emailed code for a session.
///
/// Rejections that change stored state (attempt counts, session expiry) come
/// back in the inner `Result` so the transaction still commits them.
pub fn verify(
    tx: &WriteTx,
    raw_email: &str,
    code: &str,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<Result<RegistrationSession, VeloraError>, VeloraError> {
    if raw_email.trim().is_empty() || code.trim().is_empty() || session_id.trim().is_empty() {
        return Err(VeloraError::invalid(
            "Email, OTP, and session ID are required",
        ));
    }
    let email = raw_email.trim().to_lowercase();
    let mut session = match session_by_id(tx, session_id.trim())? {
        Some(session) if session.email == email => session,
        _ => return Err(invalid_session()),
    };
    if session.status == RegistrationStatus::Expired {
        return Err(session_expired());
    }
    if session.is_expired(now) {
        session.status = RegistrationStatus::Expired;
        tx.put(&session)?;
        return Ok(Err(session_expired()));
    }

    if let Err(rejected) = otp::verify(tx, &email, code, OtpPurpose::Registration, now)? {
        return Ok(Err(rejected));
    }
    session.status = RegistrationStatus::EmailVerified;
    session.session_id = new_session_id();
    tx.put(&session)?;
    Ok(Ok(session))
}

/// Input for [`complete`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteRegistration {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Create the account for a verified session.
pub fn complete(
    tx: &WriteTx,
    input: CompleteRegistration,
    now: DateTime<Utc>,
) -> Result<User, VeloraError> {
    let session_id = input.session_id.trim();
    if session_id.is_empty() {
        return Err(VeloraError::invalid("Session ID is required"));
    }
    let session = session_by_id(tx, session_id)?.ok_or_else(invalid_session)?;
    if session.status == RegistrationStatus::Expired || session.is_expired(now) {
        return Err(session_expired());
    }
    if session.status != RegistrationStatus::EmailVerified {
        return Err(VeloraError::invalid(
            "Email not verified. Please verify your OTP first.",
        ));
    }
    if input.password.is_empty() {
        return Err(VeloraError::invalid("Password is required"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(VeloraError::invalid(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if input
        .confirm_password
        .as_deref()
        .is_some_and(|confirm| confirm != input.password)
    {
        return Err(VeloraError::invalid("Passwords do not match"));
    }

    let user = accounts::create_user(
        tx,
        NewUser {
            email: session.email.clone(),
            password: input.password,
            first_name: input.first_name,
            last_name: input.last_name,
            email_verified: true,
            is_staff: false,
        },
        now,
    )?;
    tx.delete::<RegistrationSession>(session.id.0)?;
    otp::clear_for_email(tx, &session.email)?;
    Ok(user)
}

/// Issue a new code for an email. A live registration session for the email
/// goes back to `email_sent`.
pub fn resend(
    tx: &WriteTx,
    policy: &OtpPolicy,
    raw_email: &str,
    purpose: OtpPurpose,
    now: DateTime<Utc>,
) -> Result<EmailOtp, VeloraError> {
    let email = validate::email(raw_email)?;
    let code = otp::issue(tx, policy, &email, purpose, now)?;
    if purpose == OtpPurpose::Registration {
        let live = tx.filter::<RegistrationSession>(|s| {
            s.email == email && !s.is_expired(now) && s.status != RegistrationStatus::Expired
        })?;
        for mut session in live {
            session.status = RegistrationStatus::EmailSent;
            tx.put(&session)?;
        }
    }
    Ok(code)
}

/// Mark sessions past their expiry as expired. Returns how many changed.
pub fn cleanup_expired(tx: &WriteTx, now: DateTime<Utc>) -> Result<usize, VeloraError> {
    let stale = tx.filter::<RegistrationSession>(|s| {
        s.is_expired(now) && s.status != RegistrationStatus::Expired
    })?;
    for mut session in stale.iter().cloned() {
        session.status = RegistrationStatus::Expired;
        tx.put(&session)?;
    }
    Ok(stale.len())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use crate::platform::{PlatformUpdate, update_settings};
    use crate::types::OtpErrorCode;

    const EMAIL: &str = "new@example.com";

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn start(store: &Store) -> (RegistrationSession, EmailOtp) {
        store
            .write(|tx| initiate(tx, &OtpPolicy::default(), EMAIL, t0()))
            .expect("initiate")
    }

    fn verified(store: &Store) -> RegistrationSession {
        let (session, code) = start(store);
        store
            .write(|tx| verify(tx, EMAIL, &code.code, &session.session_id, t0()))
            .expect("verify")
            .expect("accepted")
    }

    fn completion(session_id: &str, password: &str) -> CompleteRegistration {
        CompleteRegistration {
            session_id: session_id.to_string(),
            password: password.to_string(),
            confirm_password: Some(password.to_string()),
            ..CompleteRegistration::default()
        }
    }

    #[test]
    fn initiate_opens_session_and_sends_code() {
        let store = Store::in_memory().expect("store");
        let (session, code) = start(&store);
        assert_eq!(session.status, RegistrationStatus::EmailSent);
        assert_eq!(session.session_id.len(), 32);
        assert!(session.session_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(session.expires_at - session.created_at, Duration::hours(24));
        assert_eq!(code.purpose, OtpPurpose::Registration);
    }

    #[test]
    fn restart_replaces_session() {
        let store = Store::in_memory().expect("store");
        start(&store);
        let (second, _) = start(&store);
        let sessions = store
            .read(|tx| tx.scan::<RegistrationSession>())
            .expect("scan");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, second.session_id);
    }

    #[test]
    fn full_flow_creates_verified_user_and_cleans_up() {
        let store = Store::in_memory().expect("store");
        let (initial, _) = start(&store);
        let session = verified(&store);
        assert_eq!(session.status, RegistrationStatus::EmailVerified);
        assert_ne!(session.session_id, initial.session_id);

        let user = store
            .write(|tx| complete(tx, completion(&session.session_id, "s3cure-pass"), t0()))
            .expect("complete");
        assert!(user.email_verified);
        assert_eq!(user.username, "new");

        let (sessions, codes) = store
            .read(|tx| Ok((tx.count::<RegistrationSession>()?, tx.count::<EmailOtp>()?)))
            .expect("counts");
        assert_eq!((sessions, codes), (0, 0));
    }

    #[test]
    fn existing_email_cannot_register() {
        let store = Store::in_memory().expect("store");
        let session = verified(&store);
        store
            .write(|tx| complete(tx, completion(&session.session_id, "s3cure-pass"), t0()))
            .expect("complete");
        let err = store
            .write(|tx| initiate(tx, &OtpPolicy::default(), EMAIL, t0()))
            .expect_err("duplicate");
        assert_eq!(err.to_string(), "User with this email already exists");
    }

    #[test]
    fn complete_requires_verification() {
        let store = Store::in_memory().expect("store");
        let (session, _) = start(&store);
        let err = store
            .write(|tx| complete(tx, completion(&session.session_id, "s3cure-pass"), t0()))
            .expect_err("unverified");
        assert_eq!(
            err.to_string(),
            "Email not verified. Please verify your OTP first."
        );
    }

    #[test]
    fn complete_checks_password_rules() {
        let store = Store::in_memory().expect("store");
        let session = verified(&store);
        let short = store.write(|tx| complete(tx, completion(&session.session_id, "short"), t0()));
        assert!(matches!(short, Err(VeloraError::Validation(_))));

        let mut mismatch = completion(&session.session_id, "s3cure-pass");
        mismatch.confirm_password = Some("other-pass".to_string());
        let err = store
            .write(|tx| complete(tx, mismatch, t0()))
            .expect_err("mismatch");
        assert_eq!(err.to_string(), "Passwords do not match");
    }

    #[test]
    fn wrong_session_is_invalid() {
        let store = Store::in_memory().expect("store");
        let (_, code) = start(&store);
        let err = store
            .write(|tx| verify(tx, EMAIL, &code.code, "0".repeat(32).as_str(), t0()))
            .expect_err("invalid");
        assert_eq!(err.to_string(), "Invalid session");
    }

    #[test]
    fn expired_session_is_marked() {
        let store = Store::in_memory().expect("store");
        let (session, code) = start(&store);
        let later = t0() + Duration::hours(25);
        let verdict = store
            .write(|tx| verify(tx, EMAIL, &code.code, &session.session_id, later))
            .expect("verify");
        assert_eq!(
            verdict.expect_err("expired").to_string(),
            "Registration session expired"
        );
        let stored = store
            .read(|tx| tx.require::<RegistrationSession>(session.id.0))
            .expect("session");
        assert_eq!(stored.status, RegistrationStatus::Expired);
    }

    #[test]
    fn wrong_code_attempt_is_persisted() {
        let store = Store::in_memory().expect("store");
        let (session, code) = start(&store);
        let wrong = if code.code == "123456" { "654321" } else { "123456" };
        let verdict = store
            .write(|tx| verify(tx, EMAIL, wrong, &session.session_id, t0()))
            .expect("verify");
        assert!(matches!(
            verdict,
            Err(VeloraError::Otp {
                code: OtpErrorCode::InvalidOtp,
                remaining_attempts: Some(2),
                ..
            })
        ));
        let stored = store.read(|tx| tx.require::<EmailOtp>(code.id.0)).expect("otp");
        assert_eq!(stored.attempts, 1);
    }

    #[test]
    fn closed_registrations_are_forbidden() {
        let store = Store::in_memory().expect("store");
        store
            .write(|tx| {
                update_settings(
                    tx,
                    PlatformUpdate {
                        new_user_registrations: Some(false),
                        ..PlatformUpdate::default()
                    },
                    t0(),
                )
            })
            .expect("close");
        let err = store.write(|tx| initiate(tx, &OtpPolicy::default(), EMAIL, t0()));
        assert!(matches!(err, Err(VeloraError::Forbidden(_))));
    }

    #[test]
    fn resend_resets_session_status() {
        let store = Store::in_memory().expect("store");
        let session = verified(&store);
        store
            .write(|tx| resend(tx, &OtpPolicy::default(), EMAIL, OtpPurpose::Registration, t0()))
            .expect("resend");
        let stored = store
            .read(|tx| tx.require::<RegistrationSession>(session.id.0))
            .expect("session");
        assert_eq!(stored.status, RegistrationStatus::EmailSent);
    }

    #[test]
    fn cleanup_marks_stale_sessions() {
        let store = Store::in_memory().expect("store");
        start(&store);
        let marked = store
            .write(|tx| cleanup_expired(tx, t0() + Duration::days(2)))
            .expect("cleanup");
        assert_eq!(marked, 1);
        let again = store
            .write(|tx| cleanup_expired(tx, t0() + Duration::days(2)))
            .expect("cleanup");
        assert_eq!(again, 0);
    }
}
