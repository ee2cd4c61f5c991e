//! pagewatch - browser session monitor
//!
//! Main entry point for the pagewatch CLI.

mod cli;
mod inspect;
mod server;

use clap::Parser;

use pagewatch_config::ConfigLoader;

use crate::cli::{Cli, Commands};
use crate::inspect::{inspect, print_tools};
use crate::server::{init_tracing, run_monitor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing()?;

    let mut config = ConfigLoader::load_or_default(&cli.config)?;

    match cli.command {
        None => run_monitor(config).await,
        Some(Commands::Run {
            endpoint,
            host,
            port,
        }) => {
            if let Some(endpoint) = endpoint {
                config.browser.endpoint = endpoint;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_monitor(config).await
        }
        Some(Commands::Inspect { file, errors, json }) => {
            inspect(&file, Some(&config.screenshots.dir), errors, json)
        }
        Some(Commands::Tools { format }) => print_tools(&format),
    }
}
