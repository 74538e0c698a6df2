//! folderforge: a self-hosted media asset service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folderforge::config::RootConfig;
use folderforge::synchronizer::Synchronizer;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "folderforge")]
#[command(author, version, about = "Self-hosted media asset service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the HTTP API and every folder's background loops.
    Serve {
        /// Path to the project's YAML configuration file.
        #[arg(short, long, default_value = "folderforge.yaml")]
        config: PathBuf,
    },
    /// Runs a single reconciliation pass across every configured folder and exits.
    Sync {
        #[arg(short, long, default_value = "folderforge.yaml")]
        config: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(config).await,
        Commands::Sync { config } => sync(config).await,
    }
}

#[cfg(feature = "server")]
async fn serve(config_path: PathBuf) -> Result<()> {
    let config = RootConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let (project, api_server) = config.build().context("building project from config")?;

    for folder in project.folders() {
        folder.spawn_backup_loop(folderforge::folder::DEFAULT_BACKUP_INTERVAL);
        folder.spawn_apply_to_existing();
    }

    info!(port = api_server.port, "serving project {:?}", project.name);
    folderforge::server::run_server(project, api_server.port).await
}

#[cfg(not(feature = "server"))]
async fn serve(_config_path: PathBuf) -> Result<()> {
    anyhow::bail!("this binary was built without the \"server\" feature")
}

async fn sync(config_path: PathBuf) -> Result<()> {
    let config = RootConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let (project, _api_server) = config.build().context("building project from config")?;

    let folders: Vec<_> = project.folders().cloned().collect();
    let report = Synchronizer::new(folders).run().await;

    info!(
        checked = report.sources_checked,
        resynced = report.sources_resynced,
        errors = report.errors.len(),
        "sync pass complete"
    );
    for error in &report.errors {
        tracing::warn!(%error, "sync error");
    }
    if !report.errors.is_empty() {
        anyhow::bail!("sync pass completed with {} error(s)", report.errors.len());
    }
    Ok(())
}
