//! # Mailer
//!
//! Outgoing email for OTP delivery.
//!
//! Delivery is best effort: a failed send is logged and the request that
//! triggered it still succeeds. The user can ask for a new code.

use std::sync::Mutex;
use velora_core::{OtpEmail, VeloraError};

/// A message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn from_otp(from: &str, email: OtpEmail) -> Self {
        Self {
            from: from.to_string(),
            to: email.to,
            subject: email.subject,
            body: email.body,
        }
    }
}

/// An email transport.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutgoingEmail) -> Result<(), VeloraError>;
}

/// Send and log the outcome. Never fails.
pub fn deliver(mailer: &dyn Mailer, email: &OutgoingEmail) {
    match mailer.send(email) {
        Ok(()) => tracing::info!(to = %email.to, subject = %email.subject, "Email sent"),
        Err(e) => tracing::error!(
            event = "email_failure",
            to = %email.to,
            "Failed to send email: {}",
            e
        ),
    }
}

// =============================================================================
// TRANSPORTS
// =============================================================================

/// Writes messages to the log instead of a mail server.
///
/// Bodies carry OTP codes, so they are only logged at debug level.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), VeloraError> {
        tracing::info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            "Outgoing email"
        );
        tracing::debug!(to = %email.to, body = %email.body, "Outgoing email body");
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<OutgoingEmail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The most recent message to an address.
    pub fn last_to(&self, to: &str) -> Option<OutgoingEmail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), VeloraError> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(email.clone());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
