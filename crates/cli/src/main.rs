//! LedgerLens CLI: the main entry point.
//!
//! Commands:
//! - `replay`  - Play a recorded event stream through the transcript aggregator
//! - `config`  - Show, locate, initialise, or validate configuration
//! - `status`  - Show the effective assistant settings

use clap::{Parser, Subcommand};
use ledgerlens_config::AppConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ledgerlens",
    about = "LedgerLens - assistant transcript tooling",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines recording of stream events
    Replay {
        /// Recording file (one event per line)
        file: PathBuf,

        /// Conversation id to attribute the exchange to
        #[arg(short, long, env = "LEDGERLENS_CONVERSATION")]
        conversation: Option<String>,

        /// Delay between events in milliseconds
        #[arg(short, long, default_value_t = 0)]
        delay_ms: u64,

        /// Print the final transcript as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show assistant settings
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate the configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let log = AppConfig::load().map(|c| c.log).unwrap_or_default();
    let filter = if cli.verbose { "debug".to_string() } else { log.filter };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json || log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Replay {
            file,
            conversation,
            delay_ms,
            json,
        } => commands::replay::run(file, conversation, delay_ms, json).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
