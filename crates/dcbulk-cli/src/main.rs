//! dcbulk CLI - Bulk uploads into a room hierarchy
//!
//! Provides commands for:
//! - Uploading files and directory trees
//! - Creating folders and rooms
//! - Listing and deleting nodes
//! - Distributing room keys to members that lack them
//!
//! Exit codes: 0 on success, 1 when a command could not run, 2 when it ran
//! but some files, folders or key records failed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    distribute::DistributeCommand, ls::LsCommand, mkdir::MkdirCommand, mkroom::MkroomCommand,
    rm::RmCommand, upload::UploadCommand, Outcome,
};
use dcbulk_core::config::Config;
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "dcbulk", version, about = "Bulk uploads into rooms and folders")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload a file or directory tree
    Upload(UploadCommand),
    /// Create a folder
    Mkdir(MkdirCommand),
    /// Create a room
    Mkroom(MkroomCommand),
    /// List a room or folder, or the top-level rooms
    Ls(LsCommand),
    /// Delete a file, folder or room
    Rm(RmCommand),
    /// Give room members without a key record the room's content key
    Distribute(DistributeCommand),
}

fn init_tracing(verbose: u8, config: &Config) {
    let fallback = match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()),
    };
    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration: {}", details.join("; "));
    }
    Ok(config)
}

/// Cancel `token` on the first Ctrl-C
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight uploads");
            token.cancel();
        }
    });
}

async fn run(cli: Cli, config: Config, format: OutputFormat) -> Result<Outcome> {
    match cli.command {
        Commands::Upload(cmd) => {
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());
            cmd.execute(format, &config, &cancel).await
        }
        Commands::Mkdir(cmd) => cmd.execute(format).await,
        Commands::Mkroom(cmd) => cmd.execute(format).await,
        Commands::Ls(cmd) => cmd.execute(format, &config).await,
        Commands::Rm(cmd) => cmd.execute(format).await,
        Commands::Distribute(cmd) => cmd.execute(format, &config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let formatter = get_formatter(format);

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::from(1);
        }
    };
    init_tracing(cli.verbose, &config);
    info!(version = env!("CARGO_PKG_VERSION"), "dcbulk starting");

    match run(cli, config, format).await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            ExitCode::from(1)
        }
    }
}
