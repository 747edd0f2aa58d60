//! # Careflow CLI Module
//!
//! This module implements the CLI interface for Careflow.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize new database
//! - `admit` - Admit patients from a JSON file
//! - `transition` - Apply the first matching rule to a patient
//! - `history` - Show a patient's transition history
//! - `show` - Show a patient, or list patient ids
//! - `rules` - Print the loaded rule table and stage map

mod commands;

use careflow_core::CareflowError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Careflow - Patient Cohort Pipeline
///
/// Moves patients between care stages according to a declarative rule table.
#[derive(Parser, Debug)]
#[command(name = "careflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the patient database
    #[arg(short = 'D', long, global = true, default_value = "careflow.redb")]
    pub database: PathBuf,

    /// Rule file (TOML, or JSON when the extension is .json). Built-in rules when omitted
    #[arg(short = 'R', long, global = true)]
    pub rules: Option<PathBuf>,

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
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Keep all data in memory; nothing is written to disk
        #[arg(long)]
        ephemeral: bool,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Admit patients from a JSON file (one object or an array of objects)
    Admit {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Apply the first matching rule to a patient
    Transition {
        /// Patient id
        #[arg(short, long)]
        patient: u64,
    },

    /// Show a patient's transition history
    History {
        /// Patient id
        #[arg(short, long)]
        patient: u64,
    },

    /// Show a patient with its stage record, or list patient ids
    Show {
        /// Patient id (lists all ids when omitted)
        #[arg(short, long)]
        patient: Option<u64>,
    },

    /// Print the rule table and stage map
    Rules,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CareflowError> {
    let json_mode = cli.json_mode;
    let rules = cli.rules.as_deref();

    match cli.command {
        Some(Commands::Server {
            host,
            port,
            ephemeral,
        }) => cmd_server(&cli.database, rules, &host, port, ephemeral).await,
        Some(Commands::Init { force }) => cmd_init(&cli.database, force),
        Some(Commands::Admit { file }) => cmd_admit(&cli.database, rules, json_mode, &file),
        Some(Commands::Transition { patient }) => {
            cmd_transition(&cli.database, rules, json_mode, patient)
        }
        Some(Commands::History { patient }) => cmd_history(&cli.database, json_mode, patient),
        Some(Commands::Show { patient }) => cmd_show(&cli.database, json_mode, patient),
        Some(Commands::Rules) => cmd_rules(rules, json_mode, cli.verbose),
        None => {
            // No subcommand - list patients by default
            cmd_show(&cli.database, json_mode, None)
        }
    }
}
