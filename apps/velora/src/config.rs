//! # Configuration
//!
//! Settings are resolved in three layers, later ones winning:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config velora.toml`)
//! 3. `VELORA_*` environment variables
//!
//! ## Environment Variables
//!
//! - `VELORA_DATABASE`: Path of the redb database file
//! - `VELORA_HOST` / `VELORA_PORT`: Listen address
//! - `VELORA_JWT_SECRET`: Token signing secret (random per process if unset)
//! - `VELORA_ACCESS_TOKEN_MINUTES` / `VELORA_REFRESH_TOKEN_DAYS`: Token lifetimes
//! - `VELORA_OTP_EXPIRY_MINUTES` / `VELORA_OTP_MAX_ATTEMPTS`: OTP policy
//! - `VELORA_ADMIN_KEY`: Enables the admin API when set
//! - `VELORA_CORS_ORIGINS`: Comma-separated origins, or "*" for all
//! - `VELORA_RATE_LIMIT`: Requests per second (0 disables)
//! - `VELORA_DEMO_LOGIN`: Enables `POST /api/auth/demo/login/`
//! - `VELORA_EXPOSE_DEBUG_OTP`: Echo OTP codes in resend responses (development only)
//! - `VELORA_MAIL_FROM`: Sender address of outgoing email

use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use velora_core::primitives::{
    MAX_ACCESS_TOKEN_MINUTES, MAX_OTP_EXPIRY_MINUTES, MAX_REFRESH_TOKEN_DAYS,
};
use velora_core::{OtpPolicy, TokenIssuer, VeloraError, tokens};

/// Default requests per second for the global rate limiter.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: PathBuf,
    pub host: String,
    pub port: u16,
    /// Empty means "generate one at startup".
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub otp_expiry_minutes: i64,
    pub otp_max_attempts: u32,
    pub admin_key: Option<String>,
    pub cors_origins: Option<String>,
    pub rate_limit: u32,
    pub demo_login: bool,
    pub expose_debug_otp: bool,
    pub mail_from: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let otp = OtpPolicy::default();
        Self {
            database: PathBuf::from("velora.db"),
            host: "127.0.0.1".to_string(),
            port: 8080,
            jwt_secret: String::new(),
            access_token_minutes: velora_core::primitives::ACCESS_TOKEN_MINUTES,
            refresh_token_days: velora_core::primitives::REFRESH_TOKEN_DAYS,
            otp_expiry_minutes: otp.expiry_minutes,
            otp_max_attempts: otp.max_attempts,
            admin_key: None,
            cors_origins: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            demo_login: false,
            expose_debug_otp: false,
            mail_from: "noreply@velora.com".to_string(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// Defaults, then the file at `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, VeloraError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, VeloraError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            VeloraError::Internal(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, VeloraError> {
        toml::from_str(text).map_err(|e| VeloraError::invalid(format!("Invalid config: {}", e)))
    }

    /// Override fields from `VELORA_*` variables. Unparseable numbers are
    /// ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn number<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
            let parsed = raw.trim().parse().ok();
            if parsed.is_none() {
                tracing::warn!("Ignoring {}: '{}' is not a number", key, raw);
            }
            parsed
        }

        if let Some(v) = lookup("VELORA_DATABASE") {
            self.database = PathBuf::from(v);
        }
        if let Some(v) = lookup("VELORA_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("VELORA_PORT").and_then(|v| number("VELORA_PORT", &v)) {
            self.port = v;
        }
        if let Some(v) = lookup("VELORA_JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Some(v) = lookup("VELORA_ACCESS_TOKEN_MINUTES")
            .and_then(|v| number("VELORA_ACCESS_TOKEN_MINUTES", &v))
        {
            self.access_token_minutes = v;
        }
        if let Some(v) = lookup("VELORA_REFRESH_TOKEN_DAYS")
            .and_then(|v| number("VELORA_REFRESH_TOKEN_DAYS", &v))
        {
            self.refresh_token_days = v;
        }
        if let Some(v) = lookup("VELORA_OTP_EXPIRY_MINUTES")
            .and_then(|v| number("VELORA_OTP_EXPIRY_MINUTES", &v))
        {
            self.otp_expiry_minutes = v;
        }
        if let Some(v) = lookup("VELORA_OTP_MAX_ATTEMPTS")
            .and_then(|v| number("VELORA_OTP_MAX_ATTEMPTS", &v))
        {
            self.otp_max_attempts = v;
        }
        if let Some(v) = lookup("VELORA_ADMIN_KEY") {
            self.admin_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some(v) = lookup("VELORA_CORS_ORIGINS") {
            self.cors_origins = Some(v);
        }
        if let Some(v) = lookup("VELORA_RATE_LIMIT").and_then(|v| number("VELORA_RATE_LIMIT", &v)) {
            self.rate_limit = v;
        }
        if let Some(v) = lookup("VELORA_DEMO_LOGIN").and_then(|v| parse_flag(&v)) {
            self.demo_login = v;
        }
        if let Some(v) = lookup("VELORA_EXPOSE_DEBUG_OTP").and_then(|v| parse_flag(&v)) {
            self.expose_debug_otp = v;
        }
        if let Some(v) = lookup("VELORA_MAIL_FROM") {
            self.mail_from = v;
        }
    }

    pub fn validate(&self) -> Result<(), VeloraError> {
        fn within(name: &str, value: i64, max: i64, unit: &str) -> Result<(), VeloraError> {
            if value <= 0 || value > max {
                return Err(VeloraError::invalid(format!(
                    "{} must be between 1 and {} {}",
                    name, max, unit
                )));
            }
            Ok(())
        }

        within(
            "access_token_minutes",
            self.access_token_minutes,
            MAX_ACCESS_TOKEN_MINUTES,
            "minutes",
        )?;
        within(
            "refresh_token_days",
            self.refresh_token_days,
            MAX_REFRESH_TOKEN_DAYS,
            "days",
        )?;
        within(
            "otp_expiry_minutes",
            self.otp_expiry_minutes,
            MAX_OTP_EXPIRY_MINUTES,
            "minutes",
        )?;
        if self.otp_max_attempts == 0 {
            return Err(VeloraError::invalid("otp_max_attempts must be positive"));
        }
        Ok(())
    }

    pub fn otp_policy(&self) -> OtpPolicy {
        OtpPolicy {
            expiry_minutes: self.otp_expiry_minutes,
            max_attempts: self.otp_max_attempts,
            ..OtpPolicy::default()
        }
    }

    /// Token issuer for the configured secret. Without one, a random secret is
    /// generated and a warning logged.
    pub fn token_issuer(&self) -> TokenIssuer {
        let secret = if self.jwt_secret.is_empty() {
            tracing::warn!(
                "No VELORA_JWT_SECRET configured - using a random secret. \
                 Issued tokens will not survive a restart."
            );
            tokens::random_secret()
        } else {
            self.jwt_secret.clone()
        };
        TokenIssuer::with_lifetimes(
            secret.as_bytes(),
            Duration::minutes(self.access_token_minutes),
            Duration::days(self.refresh_token_days),
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
