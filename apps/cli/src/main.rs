//! panelbak CLI - Panel backup downloader
//!
//! Fetches one backup from a game-server panel and saves it to the
//! current directory.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use panelbak_core::{PanelConfig, ENV_API_KEY, ENV_BACKUP_NUM, ENV_PANEL_URL, ENV_SERVER_ID};
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// panelbak - Download a backup from a game-server panel
#[derive(Parser)]
#[command(name = "panelbak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Panel-assigned server identifier
    #[arg(long, env = ENV_SERVER_ID, hide_env_values = true)]
    server_id: Option<String>,

    /// Client API key
    #[arg(long, env = ENV_API_KEY, hide_env_values = true)]
    api_key: Option<String>,

    /// Zero-based index into the server's backup list
    #[arg(long, env = ENV_BACKUP_NUM)]
    backup_num: Option<String>,

    /// Panel host, e.g. panel.example.com
    #[arg(long, env = ENV_PANEL_URL)]
    panel_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the selected backup (default)
    Download,

    /// List the server's backups with their indices
    List,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // .env must be in the environment before clap reads it
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    }

    let command = cli.command.unwrap_or(Commands::Download);

    // Listing does not select a backup, so the index may be left unset
    let backup_num = match (&command, cli.backup_num.as_deref()) {
        (Commands::List, None) => "0",
        (_, value) => value.unwrap_or_default(),
    };

    let config = PanelConfig::new(
        cli.server_id.as_deref().unwrap_or_default(),
        cli.api_key.as_deref().unwrap_or_default(),
        backup_num,
        cli.panel_url.as_deref().unwrap_or_default(),
    )
    .context("Invalid configuration")?;
    debug!("Using {:?}", config);

    match command {
        Commands::Download => {
            let destination =
                std::env::current_dir().context("Failed to read current directory")?;
            let code = commands::download_backup(
                config,
                destination,
                &mut std::io::stdout(),
                &mut std::io::stderr(),
            )
            .await?;
            Ok(ExitCode::from(code))
        }
        Commands::List => {
            commands::list_backups(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
