//! CLI definitions for pagewatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pagewatch CLI.
#[derive(Parser)]
#[command(name = "pagewatch")]
#[command(about = "Browser session monitor with a structured event log and a control bridge")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/pagewatch.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Attach to a browser and monitor it (default)
    Run {
        /// Remote debugging endpoint, e.g. http://127.0.0.1:9222
        #[arg(long, env = "PAGEWATCH_ENDPOINT")]
        endpoint: Option<String>,

        /// HTTP server host
        #[arg(long)]
        host: Option<String>,

        /// HTTP server port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Summarize a session log file
    Inspect {
        /// Path to a session-*.log file
        file: PathBuf,

        /// Only show error entries
        #[arg(long)]
        errors: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the control tool definitions
    Tools {
        /// Output format (native, anthropic, openai)
        #[arg(long, default_value = "native")]
        format: String,
    },
}
