//! # Email One-Time Passwords
//!
//! Numeric codes mailed to an address to prove its ownership.
//!
//! Each (email, purpose) pair has at most one live code: issuing a new one
//! drops any unverified predecessor. Every verification attempt is counted
//! and persisted before the code is compared, so a rejected guess still
//! uses up an attempt.
//!
//! ## Rejections
//!
//! `verify` returns `Ok(Err(..))` for a rejected code. The outer `Ok` lets the
//! surrounding write transaction commit the attempt counter; callers apply
//! `?` twice.

use crate::primitives::{OTP_CODE_LENGTH, OTP_EXPIRY_MINUTES, OTP_MAX_ATTEMPTS};
use crate::storage::{Reader, WriteTx, impl_record};
use crate::types::{OtpErrorCode, OtpId, OtpPurpose, VeloraError};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// An issued code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailOtp {
    pub id: OtpId,
    pub email: String,
    pub code: String,
    pub purpose: OtpPurpose,
    pub attempts: u32,
    pub max_attempts: u32,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl_record!(EmailOtp, OtpId, "OTP", "email_otps");

impl EmailOtp {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Attempts left before the code locks.
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }
}

/// Tunable OTP parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpPolicy {
    pub expiry_minutes: i64,
    pub max_attempts: u32,
    pub code_length: usize,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            expiry_minutes: OTP_EXPIRY_MINUTES,
            max_attempts: OTP_MAX_ATTEMPTS,
            code_length: OTP_CODE_LENGTH,
        }
    }
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn rejection(code: OtpErrorCode, message: impl Into<String>) -> VeloraError {
    VeloraError::Otp {
        code,
        message: message.into(),
        remaining_attempts: None,
    }
}

/// Issue a fresh code for (email, purpose), replacing unverified ones.
pub fn issue(
    tx: &WriteTx,
    policy: &OtpPolicy,
    email: &str,
    purpose: OtpPurpose,
    now: DateTime<Utc>,
) -> Result<EmailOtp, VeloraError> {
    tx.delete_where::<EmailOtp>(|otp| {
        otp.email == email && otp.purpose == purpose && !otp.is_verified
    })?;
    let mut otp = EmailOtp {
        id: OtpId::default(),
        email: email.to_string(),
        code: generate_code(policy.code_length),
        purpose,
        attempts: 0,
        max_attempts: policy.max_attempts,
        is_verified: false,
        created_at: now,
        expires_at: now + Duration::minutes(policy.expiry_minutes),
        verified_at: None,
    };
    tx.insert(&mut otp)?;
    Ok(otp)
}

/// The most recently issued code for (email, purpose).
pub fn latest(
    tx: &impl Reader,
    email: &str,
    purpose: OtpPurpose,
) -> Result<Option<EmailOtp>, VeloraError> {
    Ok(tx
        .filter::<EmailOtp>(|otp| otp.email == email && otp.purpose == purpose)?
        .into_iter()
        .max_by_key(|otp| otp.id))
}

/// Check a submitted code.
///
/// The inner `Result` carries the verdict; see the module docs.
pub fn verify(
    tx: &WriteTx,
    email: &str,
    code: &str,
    purpose: OtpPurpose,
    now: DateTime<Utc>,
) -> Result<Result<EmailOtp, VeloraError>, VeloraError> {
    let Some(mut otp) = latest(tx, email, purpose)? else {
        return Ok(Err(rejection(
            OtpErrorCode::OtpNotFound,
            "Invalid or expired OTP. Please request a new one.",
        )));
    };
    if otp.is_verified {
        return Ok(Err(rejection(
            OtpErrorCode::OtpAlreadyUsed,
            "This OTP has already been used. Please request a new one.",
        )));
    }
    if otp.is_expired(now) {
        return Ok(Err(rejection(
            OtpErrorCode::OtpExpired,
            "OTP has expired. Please request a new one.",
        )));
    }
    if otp.attempts >= otp.max_attempts {
        return Ok(Err(rejection(
            OtpErrorCode::MaxAttemptsExceeded,
            "Too many failed attempts. Please request a new OTP.",
        )));
    }

    otp.attempts += 1;
    if otp.code == code.trim() {
        otp.is_verified = true;
        otp.verified_at = Some(now);
        tx.put(&otp)?;
        return Ok(Ok(otp));
    }
    tx.put(&otp)?;
    let remaining = otp.remaining_attempts();
    Ok(Err(VeloraError::Otp {
        code: OtpErrorCode::InvalidOtp,
        message: format!("Invalid OTP. {} attempts remaining.", remaining),
        remaining_attempts: Some(remaining),
    }))
}

/// Delete every code for an email, whatever its purpose or state.
pub fn clear_for_email(tx: &WriteTx, email: &str) -> Result<usize, VeloraError> {
    tx.delete_where::<EmailOtp>(|otp| otp.email == email)
}

/// Delete expired codes. Returns how many were removed.
pub fn cleanup_expired(tx: &WriteTx, now: DateTime<Utc>) -> Result<usize, VeloraError> {
    tx.delete_where::<EmailOtp>(|otp| otp.is_expired(now))
}

// =============================================================================
// EMAIL CONTENT
// =============================================================================

/// A rendered OTP email, ready for a mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Subject line for a purpose.
pub const fn subject_for(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::Registration => "Welcome to VELORA - Verify Your Email",
        OtpPurpose::Login => "VELORA - Your Login Code",
        OtpPurpose::PasswordReset => "VELORA - Reset Your Password",
        OtpPurpose::EmailVerification => "VELORA - Verify Your Email",
    }
}

impl OtpEmail {
    pub fn for_otp(otp: &EmailOtp, policy: &OtpPolicy) -> Self {
        let body = format!(
            "Hello,\n\n\
             Your VELORA verification code is: {}\n\n\
             This code will expire in {} minutes.\n\n\
             If you didn't request this code, please ignore this email.\n\n\
             Best regards,\n\
             VELORA Team",
            otp.code, policy.expiry_minutes
        );
        Self {
            to: otp.email.clone(),
            subject: subject_for(otp.purpose).to_string(),
            body,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::Store;

    const EMAIL: &str = "jane@example.com";

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn issued(store: &Store, purpose: OtpPurpose) -> EmailOtp {
        store
            .write(|tx| issue(tx, &OtpPolicy::default(), EMAIL, purpose, t0()))
            .expect("issue")
    }

    fn error_code(result: Result<EmailOtp, VeloraError>) -> OtpErrorCode {
        match result {
            Err(VeloraError::Otp { code, .. }) => code,
            other => panic!("expected OTP rejection, got {other:?}"),
        }
    }

    #[test]
    fn codes_are_six_digits() {
        let store = Store::in_memory().expect("store");
        let otp = issued(&store, OtpPurpose::Registration);
        assert_eq!(otp.code.len(), 6);
        assert!(otp.code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(otp.expires_at - otp.created_at, Duration::minutes(10));
    }

    #[test]
    fn reissue_replaces_unverified_code() {
        let store = Store::in_memory().expect("store");
        issued(&store, OtpPurpose::Registration);
        let second = issued(&store, OtpPurpose::Registration);
        issued(&store, OtpPurpose::Login);
        let codes = store
            .read(|tx| tx.filter::<EmailOtp>(|o| o.purpose == OtpPurpose::Registration))
            .expect("scan");
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].id, second.id);
    }

    #[test]
    fn correct_code_verifies_once() {
        let store = Store::in_memory().expect("store");
        let otp = issued(&store, OtpPurpose::Registration);
        let verdict = store
            .write(|tx| verify(tx, EMAIL, &otp.code, OtpPurpose::Registration, t0()))
            .expect("verify");
        assert!(verdict.expect("accepted").is_verified);

        let again = store
            .write(|tx| verify(tx, EMAIL, &otp.code, OtpPurpose::Registration, t0()))
            .expect("verify");
        assert_eq!(error_code(again), OtpErrorCode::OtpAlreadyUsed);
    }

    #[test]
    fn wrong_code_counts_down_and_locks() {
        let store = Store::in_memory().expect("store");
        let otp = issued(&store, OtpPurpose::Login);
        let wrong = if otp.code == "000000" { "111111" } else { "000000" };

        for expected_left in [2u32, 1, 0] {
            let verdict = store
                .write(|tx| verify(tx, EMAIL, wrong, OtpPurpose::Login, t0()))
                .expect("verify");
            match verdict {
                Err(VeloraError::Otp {
                    code: OtpErrorCode::InvalidOtp,
                    message,
                    remaining_attempts,
                }) => {
                    assert_eq!(remaining_attempts, Some(expected_left));
                    assert_eq!(
                        message,
                        format!("Invalid OTP. {} attempts remaining.", expected_left)
                    );
                }
                other => panic!("unexpected verdict {other:?}"),
            }
        }

        // Locked now, even for the right code.
        let locked = store
            .write(|tx| verify(tx, EMAIL, &otp.code, OtpPurpose::Login, t0()))
            .expect("verify");
        assert_eq!(error_code(locked), OtpErrorCode::MaxAttemptsExceeded);
    }

    #[test]
    fn expired_code_is_rejected() {
        let store = Store::in_memory().expect("store");
        let otp = issued(&store, OtpPurpose::Registration);
        let later = t0() + Duration::minutes(11);
        let verdict = store
            .write(|tx| verify(tx, EMAIL, &otp.code, OtpPurpose::Registration, later))
            .expect("verify");
        assert_eq!(error_code(verdict), OtpErrorCode::OtpExpired);
    }

    #[test]
    fn purposes_do_not_cross() {
        let store = Store::in_memory().expect("store");
        let otp = issued(&store, OtpPurpose::Registration);
        let verdict = store
            .write(|tx| verify(tx, EMAIL, &otp.code, OtpPurpose::Login, t0()))
            .expect("verify");
        assert_eq!(error_code(verdict), OtpErrorCode::OtpNotFound);
    }

    #[test]
    fn cleanup_removes_only_expired() {
        let store = Store::in_memory().expect("store");
        issued(&store, OtpPurpose::Registration);
        let removed_early = store
            .write(|tx| cleanup_expired(tx, t0() + Duration::minutes(5)))
            .expect("cleanup");
        assert_eq!(removed_early, 0);
        let removed = store
            .write(|tx| cleanup_expired(tx, t0() + Duration::minutes(15)))
            .expect("cleanup");
        assert_eq!(removed, 1);
    }

    #[test]
    fn email_uses_purpose_subject() {
        let store = Store::in_memory().expect("store");
        let otp = issued(&store, OtpPurpose::Login);
        let mail = OtpEmail::for_otp(&otp, &OtpPolicy::default());
        assert_eq!(mail.subject, "VELORA - Your Login Code");
        assert!(mail.body.contains(&otp.code));
        assert!(mail.body.contains("expire in 10 minutes"));
        assert_eq!(mail.to, EMAIL);
    }
}
