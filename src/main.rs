//! wbs - watch, build, serve
//!
//! Entry point for the wbs command.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::builder::PossibleValuesParser;
use clap::Parser;
use tokio::signal;
use wbs::observability::{init_tracing, TracingConfig, LOG_LEVELS};
use wbs::process::{Builder, Runner};
use wbs::watcher::FileWatcher;
use wbs::{Config, Orchestrator};

/// Rebuild and restart a development server when files change
#[derive(Parser, Debug)]
#[command(name = "wbs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./wbs.toml if present)
    #[arg(short = 'c', long = "config", env = "WBS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        env = "WBS_LOG_LEVEL",
        default_value = "info",
        value_parser = PossibleValuesParser::new(LOG_LEVELS)
    )]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "WBS_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&TracingConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    tracing::info!("wbs v{} starting", env!("CARGO_PKG_VERSION"));

    let (config, source) =
        Config::discover(cli.config.as_deref()).context("failed to load config")?;
    match &source {
        Some(path) => tracing::info!(path = %path.display(), "Using config file"),
        None => tracing::info!("No config file found, using defaults"),
    }
    tracing::debug!(?config, "Configuration loaded");

    let watcher = FileWatcher::new(&config).context("failed to initialize watcher")?;
    let runner = Runner::new(&config).context("failed to initialize runner")?;
    let builder = Builder::new(&config).context("failed to initialize builder")?;

    let shutdown = shutdown_signal();
    let mut orchestrator = Orchestrator::new(&config, watcher, builder, runner);
    if let Err(e) = orchestrator.start().await {
        let stage = if matches!(e, wbs::Error::Build(_)) {
            "failed to build"
        } else {
            "failed to start server"
        };
        return Err(anyhow::Error::new(e).context(stage));
    }

    orchestrator
        .run_until(shutdown)
        .await
        .context("event loop stopped")
}

/// Wait for ctrl-c or, on Unix, SIGTERM.
///
/// The SIGTERM handler is installed when this is called, so a signal that
/// arrives during startup still ends the event loop once it begins.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to listen for SIGTERM");
            None
        }
    };

    async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match sigterm {
                Some(mut sigterm) => {
                    sigterm.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {
                tracing::info!("Received ctrl-c, shutting down");
            }
            () = terminate => {
                tracing::info!("Received SIGTERM, shutting down");
            }
        }
    }
}
