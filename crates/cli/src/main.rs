//! vitalbot CLI: the main entry point.
//!
//! Commands:
//! - `serve`:    Start the robot callback server
//! - `init-db`:  Create or upgrade the record table
//! - `history`:  Print a subject's recent readings
//! - `analyze`:  Read one image without storing anything
//! - `migrate`:  Copy SQLite records into the configured store
//! - `doctor`:   Diagnose configuration problems
//! - `onboard`:  Write a starter config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "vitalbot",
    about = "vitalbot: blood-pressure reading bot for DingTalk",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.vitalbot/config.toml)
    #[arg(short, long, global = true, env = "VITALBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the robot callback server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the record table, or add missing columns to an old one
    InitDb,

    /// Print a subject's most recent readings
    History {
        /// Staff id of the subject
        subject: String,

        /// Number of readings to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Extract and classify one monitor photo, without storing it
    Analyze {
        /// Publicly reachable image URL
        image_url: String,
    },

    /// Copy every record from a SQLite file into the configured store
    Migrate {
        /// SQLite database to read from
        #[arg(long)]
        from: PathBuf,

        /// Only count the rows that would be copied
        #[arg(long)]
        dry_run: bool,
    },

    /// Diagnose configuration problems
    Doctor,

    /// Write a starter configuration file
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::InitDb => commands::init_db::run(config_path).await?,
        Commands::History { subject, limit } => {
            commands::history::run(config_path, &subject, limit).await?
        }
        Commands::Analyze { image_url } => commands::analyze::run(config_path, &image_url).await?,
        Commands::Migrate { from, dry_run } => {
            commands::migrate::run(config_path, &from, dry_run).await?
        }
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Onboard => commands::onboard::run(config_path).await?,
    }

    Ok(())
}
