//! # VELORA - Wellness Platform Server
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   apps/velora (THE BINARY)                  │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌────────────────┐   │
//! │  │    CLI      │    │  HTTP API   │    │     Mailer     │   │
//! │  │   (clap)    │    │   (axum)    │    │  (OTP codes)   │   │
//! │  └──────┬──────┘    └──────┬──────┘    └───────┬────────┘   │
//! │         │                  │                   │            │
//! │         └──────────────────┼───────────────────┘            │
//! │                            ▼                                │
//! │                    ┌───────────────┐                        │
//! │                    │  velora-core  │                        │
//! │                    │  (THE LOGIC)  │                        │
//! │                    └───────────────┘                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Create the database with the default catalog
//! velora init
//!
//! # Start the HTTP server
//! velora server --host 0.0.0.0 --port 8080
//!
//! # Load catalog fixtures
//! velora seed -f catalog.toml
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use velora::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // VELORA_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("VELORA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "velora=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  ██╗   ██╗███████╗██╗      ██████╗ ██████╗  █████╗
  ██║   ██║██╔════╝██║     ██╔═══██╗██╔══██╗██╔══██╗
  ██║   ██║█████╗  ██║     ██║   ██║██████╔╝███████║
  ╚██╗ ██╔╝██╔══╝  ██║     ██║   ██║██╔══██╗██╔══██║
   ╚████╔╝ ███████╗███████╗╚██████╔╝██║  ██║██║  ██║
    ╚═══╝  ╚══════╝╚══════╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝

  Premium Wellness Platform v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
