//! CLI command definitions using clap.
//!
//! - check-config: load, sanitize and print the effective configuration
//! - simulate: drive an account against a fixture-backed session

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Boostr - paced achievement boosting for owned titles
#[derive(Parser, Debug)]
#[command(name = "boostr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration after clamping
    CheckConfig,

    /// Run heartbeats against a fixture session
    Simulate {
        /// YAML or JSON fixture describing the account and its titles
        #[arg(short, long)]
        fixture: PathBuf,

        /// Number of heartbeats to run
        #[arg(short = 'n', long, default_value_t = 3)]
        heartbeats: u32,

        /// Persist caches under the configured data directory
        #[arg(short, long)]
        persist: bool,
    },
}
