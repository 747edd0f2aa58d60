//! # Careflow - Patient Cohort Pipeline Server
//!
//! The main binary for the Careflow transition engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for admissions, transitions and history
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            apps/careflow (THE BINARY)         │
//! │                                               │
//! │   ┌─────────────┐        ┌─────────────┐      │
//! │   │    CLI      │        │  HTTP API   │      │
//! │   │   (clap)    │        │   (axum)    │      │
//! │   └──────┬──────┘        └──────┬──────┘      │
//! │          └───────────┬──────────┘             │
//! │                      ▼                        │
//! │             ┌─────────────────┐               │
//! │             │  careflow-core  │               │
//! │             │   (THE LOGIC)   │               │
//! │             └─────────────────┘               │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! careflow server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! careflow admit -f patients.json
//! careflow transition -p 1
//! careflow history -p 1
//! careflow rules --rules workflow.toml
//! ```

use careflow::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // CAREFLOW_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CAREFLOW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "careflow=info,careflow_core=info,tower_http=debug".into());

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

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
   ___                __ _
  / __\__ _ _ __ ___ / _| | _____      __
 / /  / _` | '__/ _ \ |_| |/ _ \ \ /\ / /
/ /__| (_| | | |  __/  _| | (_) \ V  V /
\____/\__,_|_|  \___|_| |_|\___/ \_/\_/

  Patient Cohort Pipeline v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
