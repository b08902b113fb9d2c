//! # CLI Command Implementations

use super::catalog::{Catalog, DEFAULT_CATALOG, SeedReport};
use crate::api;
use crate::config::AppConfig;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use velora_core::concierge::{ConciergeRequest, ConciergeService};
use velora_core::plans::WellnessPlan;
use velora_core::specialists::Specialist;
use velora_core::{
    EmailOtp, Reader, RegistrationSession, Store, SubscriptionTier, User, UserSubscription,
    VeloraError, otp, registration,
};

/// Maximum catalog file size (10 MB).
const MAX_CATALOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), VeloraError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| VeloraError::Internal(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(VeloraError::invalid(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and ensure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, VeloraError> {
    let canonical = path.canonicalize().map_err(|e| {
        VeloraError::Internal(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(VeloraError::invalid(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn print_report(report: &SeedReport) {
    if report.platform_updated {
        println!("  Platform settings updated");
    }
    println!("  Tiers:      {}", report.tiers);
    println!("  Categories: {}", report.categories);
    println!("  Services:   {}", report.services);
    println!("  FAQs:       {}", report.faqs);
    println!("  Skipped:    {}", report.skipped);
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: AppConfig) -> Result<(), VeloraError> {
    let store = Store::open(&config.database)?;

    println!("VELORA Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.host);
    println!("  Port:     {}", config.port);
    println!("  Database: {:?}", config.database);
    println!(
        "  Admin:    {}",
        if config.admin_key.is_some() { "enabled" } else { "disabled" }
    );
    println!();
    println!("Endpoints:");
    println!("  POST /api/auth/register/         - Start registration");
    println!("  POST /api/auth/login/            - Password login");
    println!("  GET  /api/core/                  - Platform and tiers");
    println!("  GET  /api/specialists/           - Specialist directory");
    println!("  GET  /api/concierge/             - Concierge dashboard");
    println!("  GET  /api/wellness-plans/        - Wellness plans");
    println!("  GET  /health                     - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(store, config).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the database and load the default catalog.
pub fn cmd_init(config: &AppConfig, json_mode: bool, force: bool) -> Result<(), VeloraError> {
    let db_path = &config.database;
    if db_path.exists() {
        if !force {
            return Err(VeloraError::Conflict(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| VeloraError::Internal(format!("Cannot remove database: {}", e)))?;
    }

    let store = Store::open(db_path)?;
    let catalog = Catalog::parse(DEFAULT_CATALOG)?;
    let report = store.write(|tx| catalog.apply(tx, Utc::now()))?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "catalog": report,
        }));
        return Ok(());
    }

    println!("Initialized new database at {:?}", db_path);
    print_report(&report);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

#[derive(Debug, Serialize)]
struct StoreCounts {
    users: u64,
    subscription_tiers: u64,
    subscriptions: u64,
    specialists: u64,
    concierge_services: u64,
    concierge_requests: u64,
    wellness_plans: u64,
    pending_otps: u64,
    registration_sessions: u64,
}

/// Show record counts.
pub fn cmd_status(config: &AppConfig, json_mode: bool, verbose: bool) -> Result<(), VeloraError> {
    let store = Store::open(&config.database)?;
    let counts = store.read(|tx| {
        Ok(StoreCounts {
            users: tx.count::<User>()?,
            subscription_tiers: tx.count::<SubscriptionTier>()?,
            subscriptions: tx.count::<UserSubscription>()?,
            specialists: tx.count::<Specialist>()?,
            concierge_services: tx.count::<ConciergeService>()?,
            concierge_requests: tx.count::<ConciergeRequest>()?,
            wellness_plans: tx.count::<WellnessPlan>()?,
            pending_otps: tx.count::<EmailOtp>()?,
            registration_sessions: tx.count::<RegistrationSession>()?,
        })
    })?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.database.to_string_lossy(),
            "counts": counts,
        }));
        return Ok(());
    }

    println!("VELORA Status");
    println!("=============");
    println!("Database: {:?}", config.database);
    if verbose {
        println!("Listen:   {}:{}", config.host, config.port);
        println!(
            "Tokens:   access {} min, refresh {} days",
            config.access_token_minutes, config.refresh_token_days
        );
        println!(
            "OTP:      {} min, {} attempts",
            config.otp_expiry_minutes, config.otp_max_attempts
        );
    }
    println!();
    println!("Users:              {}", counts.users);
    println!("Subscription tiers: {}", counts.subscription_tiers);
    println!("Subscriptions:      {}", counts.subscriptions);
    println!("Specialists:        {}", counts.specialists);
    println!("Concierge services: {}", counts.concierge_services);
    println!("Concierge requests: {}", counts.concierge_requests);
    println!("Wellness plans:     {}", counts.wellness_plans);
    println!("Pending OTPs:       {}", counts.pending_otps);
    println!("Registrations:      {}", counts.registration_sessions);

    Ok(())
}

// =============================================================================
// SEED COMMAND
// =============================================================================

/// Load catalog fixtures from a TOML file.
pub fn cmd_seed(config: &AppConfig, json_mode: bool, file: &Path) -> Result<(), VeloraError> {
    let file = validate_file_path(file)?;
    validate_file_size(&file, MAX_CATALOG_FILE_SIZE)?;

    let text = std::fs::read_to_string(&file)
        .map_err(|e| VeloraError::Internal(format!("Cannot read catalog: {}", e)))?;
    let catalog = Catalog::parse(&text)?;

    let store = Store::open(&config.database)?;
    let report = store.write(|tx| catalog.apply(tx, Utc::now()))?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Loaded catalog from {:?}", file);
    print_report(&report);
    Ok(())
}

// =============================================================================
// CLEANUP COMMAND
// =============================================================================

#[derive(Debug, Serialize)]
struct CleanupReport {
    expired_otps: usize,
    expired_registrations: usize,
    purged_tokens: usize,
    compacted: bool,
}

/// Remove expired OTPs, expire stale registration sessions, and purge
/// revoked tokens past their expiry, then compact the database file.
pub fn cmd_cleanup(config: &AppConfig, json_mode: bool) -> Result<(), VeloraError> {
    let mut store = Store::open(&config.database)?;
    let now = Utc::now();

    let (expired_otps, expired_registrations, purged_tokens) = store.write(|tx| {
        Ok((
            otp::cleanup_expired(tx, now)?,
            registration::cleanup_expired(tx, now)?,
            tx.purge_revoked(now.timestamp())?,
        ))
    })?;
    let compacted = store.compact()?;

    let report = CleanupReport {
        expired_otps,
        expired_registrations,
        purged_tokens,
        compacted,
    };
    tracing::info!(
        expired_otps,
        expired_registrations,
        purged_tokens,
        "Cleanup finished"
    );

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Cleanup complete");
    println!("  Expired OTPs removed:       {}", report.expired_otps);
    println!("  Registrations expired:      {}", report.expired_registrations);
    println!("  Revoked tokens purged:      {}", report.purged_tokens);
    println!("  Database compacted:         {}", report.compacted);
    Ok(())
}
