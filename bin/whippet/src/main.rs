//! Whippet: a standalone StatsD aggregation server.
//!
//! Accepts parsed StatsD metrics on its ingress queue, aggregates them over fixed windows across
//! four metric kinds, and ships a finalized snapshot of every window to the configured backends.
#![deny(warnings)]
#![deny(missing_docs)]

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use whippet_config::{ConfigurationLoader, GenericConfiguration};

mod internal;

mod logging;
use self::logging::{initialize_logging, LoggingConfiguration};

mod run;
use self::run::run;

#[derive(Parser)]
#[command(name = "whippet", version, about = "A standalone StatsD aggregation server.")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", default_value = "/etc/whippet/whippet.yaml")]
    config: PathBuf,

    /// Log level filter override (e.g. `info` or `whippet=debug`).
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

/// Logs a message to standard error and exits the process with a non-zero exit code.
fn fatal_and_exit(message: String) -> ! {
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

fn load_configuration(cli: &Cli) -> Result<GenericConfiguration, anyhow::Error> {
    let loader = ConfigurationLoader::default()
        .try_from_yaml(&cli.config)
        .from_environment("whippet")?;
    Ok(loader.into_generic())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let configuration = match load_configuration(&cli) {
        Ok(configuration) => configuration,
        Err(e) => fatal_and_exit(format!("failed to load configuration: {}", e)),
    };

    let mut logging_config = LoggingConfiguration::from_configuration(&configuration);
    if let Some(log_level) = &cli.log_level {
        logging_config.log_level = log_level.clone();
    }

    if let Err(e) = initialize_logging(&logging_config) {
        fatal_and_exit(format!("failed to initialize logging: {}", e));
    }

    match run(configuration).await {
        Ok(()) => info!("Whippet stopped."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}
