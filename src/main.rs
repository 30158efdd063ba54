use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobsync::config::Config;
use jobsync::jobs::{CommChannel, JsonLinesChannel};
use jobsync::session::JobSession;

/// Inbound messages buffered between stdin and the gateway
const INBOUND_BUFFER: usize = 64;

#[derive(Parser)]
#[command(
    name = "jobsync",
    version,
    about = "Track remote jobs of a workspace and keep a front end in sync",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (defaults to JOBSYNC_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bridge control messages on stdin to job messages on stdout
    Serve {
        /// Workspace whose jobs are tracked
        #[arg(short, long)]
        workspace_id: Option<String>,
    },

    /// Print a summary of the workspace jobs
    List {
        /// Workspace whose jobs are listed
        #[arg(short, long)]
        workspace_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(format) = cli.log_format.clone() {
        config.logging.format = format;
    }
    config.validate()?;

    setup_tracing(&config.logging.level, &config.logging.format, cli.verbose)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "jobsync starting");

    match cli.command {
        Commands::Serve { workspace_id } => {
            let workspace_id = resolve_workspace(workspace_id, &config)?;
            tracing::info!(workspace_id = %workspace_id, "Starting serve command");
            serve(&config, &workspace_id).await?;
        }

        Commands::List { workspace_id } => {
            let workspace_id = resolve_workspace(workspace_id, &config)?;
            tracing::info!(workspace_id = %workspace_id, "Starting list command");
            list(config, &workspace_id).await?;
        }
    }

    tracing::info!("jobsync completed successfully");
    Ok(())
}

fn resolve_workspace(workspace_id: Option<String>, config: &Config) -> Result<String> {
    workspace_id
        .or_else(|| config.workspace_id.clone())
        .context("No workspace id given (use --workspace-id or JOBSYNC_WORKSPACE_ID)")
}

/// Logs go to stderr; stdout carries job messages
fn setup_tracing(level: &str, format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("jobsync=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(format!("jobsync={level},warn")))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

async fn serve(config: &Config, workspace_id: &str) -> Result<()> {
    let channel: Arc<dyn CommChannel> = Arc::new(JsonLinesChannel::stdout());
    let session = JobSession::from_config(config, channel)?;

    // Failures were already reported to the front end; keep serving
    if let Err(e) = session.coordinator().initialize(workspace_id).await {
        tracing::error!(error = %e, "Initialization failed");
    }

    let (tx, rx) = mpsc::channel::<String>(INBOUND_BUFFER);
    let gateway = session.gateway().clone();
    let dispatcher = tokio::spawn(async move { gateway.run_text(rx).await });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                None => {
                    tracing::info!("stdin closed");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    drop(tx);
    dispatcher.await.context("Gateway task failed")?;
    session.shutdown().await;
    Ok(())
}

async fn list(mut config: Config, workspace_id: &str) -> Result<()> {
    config.poller.start_on_init = false;

    let channel: Arc<dyn CommChannel> = Arc::new(jobsync::jobs::LogChannel);
    let session = JobSession::from_config(&config, channel)?;

    let report = session.coordinator().initialize(workspace_id).await?;
    if !report.failed.is_empty() {
        tracing::warn!(failed = ?report.failed, "Some jobs could not be resolved");
    }

    let table = session.coordinator().list_jobs().await?;
    print!("{table}");
    Ok(())
}
