//! roundtable CLI: the main entry point.
//!
//! Commands:
//! - `config`: Show, validate, or initialize configuration
//! - `replay`: Run a scripted session through the full runner chain

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod script;

#[derive(Parser)]
#[command(
    name = "roundtable",
    about = "roundtable: agent orchestration core",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.roundtable/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Replay a scripted conversation against the runner chain
    Replay {
        /// JSON script with the opening messages, tools and canned replies
        #[arg(short, long)]
        script: PathBuf,

        /// Force a call to this tool on the first round (repeatable)
        #[arg(short, long = "force")]
        force: Vec<String>,

        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration file
    Validate,
    /// Write the default configuration if none exists
    Init,
    /// Print the configuration file path
    Path,
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
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Init => commands::config_cmd::init(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
        Commands::Replay { script, force, json } => {
            commands::replay::run(config_path, &script, force, json).await?
        }
    }

    Ok(())
}
