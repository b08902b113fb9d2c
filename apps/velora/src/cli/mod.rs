//! # VELORA CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Create the database and load the default catalog
//! - `status` - Show record counts
//! - `seed` - Load catalog fixtures from a TOML file
//! - `cleanup` - Drop expired codes, sessions, and revoked tokens

pub mod catalog;
mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use velora_core::VeloraError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// VELORA - Premium Wellness Platform
///
/// Accounts, subscriptions, specialists, concierge, and wellness plans
/// behind one JSON API.
#[derive(Parser, Debug)]
#[command(name = "velora")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the database and load the default catalog
    Init {
        /// Recreate the database even if it exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show record counts
    Status,

    /// Load catalog fixtures (tiers, categories, services, FAQs)
    Seed {
        /// Path to the catalog TOML file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Remove expired OTPs and registration sessions, purge revoked tokens
    Cleanup,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), VeloraError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            cmd_server(config).await
        }
        Some(Commands::Init { force }) => cmd_init(&config, json_mode, force),
        Some(Commands::Status) => cmd_status(&config, json_mode, cli.verbose),
        Some(Commands::Seed { file }) => cmd_seed(&config, json_mode, &file),
        Some(Commands::Cleanup) => cmd_cleanup(&config, json_mode),
        None => cmd_status(&config, json_mode, cli.verbose),
    }
}
