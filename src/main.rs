use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(
    name = "towersync",
    version,
    about = "Upload cellular and Wi-Fi survey records to OpenCelliD and BeaconDB",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload all pending records once
    Upload {
        /// Retry with backoff while a target is failing
        #[arg(long, default_value = "false")]
        retry: bool,

        /// Print the run report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Upload periodically until interrupted
    Watch {
        /// Seconds between runs (overrides upload.interval_secs)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Print run reports as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show pending record counts
    Status {
        /// Print the summary as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Import newline-delimited JSON survey records
    Import {
        /// Input file, or `-` for standard input
        input: PathBuf,
    },

    /// Delete records that every target has accepted
    Purge {
        /// Only report how many records would be deleted
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;

    // Initialize tracing/logging
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "towersync starting");

    match cli.command {
        Commands::Upload { retry, json } => {
            tracing::info!(retry = %retry, "Starting upload command");
            commands::upload(config, retry, json).await?;
        }

        Commands::Watch { interval, json } => {
            tracing::info!(interval = ?interval, "Starting watch command");
            commands::watch(config, interval, json).await?;
        }

        Commands::Status { json } => {
            commands::status(config, json).await?;
        }

        Commands::Import { input } => {
            tracing::info!(input = %input.display(), "Starting import command");
            commands::import(config, &input).await?;
        }

        Commands::Purge { dry_run } => {
            tracing::info!(dry_run = %dry_run, "Starting purge command");
            commands::purge(config, dry_run).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("towersync=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("towersync={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
