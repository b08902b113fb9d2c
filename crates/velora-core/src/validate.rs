//! Field validation helpers shared by every service.

use crate::VeloraError;
use crate::primitives::{MAX_EMAIL_LENGTH, RATING_RANGE, WELLNESS_SCALE_RANGE};

/// Normalize and validate an email address.
///
/// Returns the trimmed, lower-cased address. The check is structural only:
/// one `@`, a non-empty local part, and a dotted domain without empty labels.
pub fn email(raw: &str) -> Result<String, VeloraError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(VeloraError::invalid("Email is required"));
    }
    if email.len() > MAX_EMAIL_LENGTH || email.chars().any(char::is_whitespace) {
        return Err(VeloraError::invalid("Enter a valid email address."));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(VeloraError::invalid("Enter a valid email address."));
    };
    let domain_ok = domain.contains('.') && domain.split('.').all(|label| !label.is_empty());
    if local.is_empty() || domain.contains('@') || !domain_ok {
        return Err(VeloraError::invalid("Enter a valid email address."));
    }
    Ok(email)
}

/// Require a non-blank value and return it trimmed.
pub fn required(field: &str, value: &str) -> Result<String, VeloraError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(VeloraError::invalid(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Reject values longer than `max` characters.
pub fn max_len(field: &str, value: &str, max: usize) -> Result<(), VeloraError> {
    if value.chars().count() > max {
        return Err(VeloraError::invalid(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Require a non-blank value of at most `max` characters.
pub fn bounded(field: &str, value: &str, max: usize) -> Result<String, VeloraError> {
    let value = required(field, value)?;
    max_len(field, &value, max)?;
    Ok(value)
}

/// Star rating, 1 to 5.
pub fn rating(field: &str, value: u8) -> Result<u8, VeloraError> {
    if !RATING_RANGE.contains(&value) {
        return Err(VeloraError::invalid(format!(
            "{} must be between {} and {}",
            field,
            RATING_RANGE.start(),
            RATING_RANGE.end()
        )));
    }
    Ok(value)
}

/// Optional self-reported wellness scale, 1 to 10.
pub fn wellness_scale(field: &str, value: Option<u8>) -> Result<Option<u8>, VeloraError> {
    match value {
        Some(v) if !WELLNESS_SCALE_RANGE.contains(&v) => Err(VeloraError::invalid(format!(
            "{} must be between {} and {}",
            field,
            WELLNESS_SCALE_RANGE.start(),
            WELLNESS_SCALE_RANGE.end()
        ))),
        other => Ok(other),
    }
}

/// Require a strictly positive count.
pub fn positive(field: &str, value: u32) -> Result<u32, VeloraError> {
    if value == 0 {
        return Err(VeloraError::invalid(format!("{} must be at least 1", field)));
    }
    Ok(value)
}
