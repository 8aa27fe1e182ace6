//! STDF poller - main entry point
//!
//! Watches the test-data taxonomy, converts new raw files and renders the
//! reports of converted leaves. `run` keeps polling until interrupted; `once`
//! and `scan` perform a single pass.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stdfp_common::config::{locate_config_file, WatchRootResolver};
use stdfp_common::logging::{init_logging, with_bootstrap_logging};
use stdfp_poller::workflow::{Daemon, Pipeline};
use stdfp_poller::Settings;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Command-line arguments for stdfp-poller
#[derive(Parser, Debug)]
#[command(name = "stdfp-poller")]
#[command(about = "Discovers STDF test data and drives conversion and reporting")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "STDFP_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the test-data taxonomy
    #[arg(short, long, env = "STDFP_WATCH_ROOT")]
    watch_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Poll until interrupted (default)
    Run {
        /// Single discovery loop instead of worker pools
        #[arg(long)]
        sequential: bool,
    },
    /// One discovery pass, dispatched sequentially
    Once,
    /// One discovery pass, print the work lists without dispatching
    Scan,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = locate_config_file(args.config.as_deref());
    // Console only until the logging section has been read
    let settings = with_bootstrap_logging(|| Settings::load(config_path.as_deref()))
        .context("Failed to load configuration")?;
    init_logging(&settings.logging).context("Failed to initialize logging")?;

    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("No configuration file found, using built-in defaults"),
    }

    let watch_root = WatchRootResolver::new(args.watch_root).resolve(settings.watch_root.as_deref());
    info!("Watch root: {}", watch_root.display());

    let pipeline = Pipeline::from_settings(watch_root, &settings)
        .context("Failed to initialize pipeline")?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    match args.command.unwrap_or(Command::Run { sequential: false }) {
        Command::Run { sequential: true } => {
            info!("Starting sequential discovery loop");
            Arc::new(pipeline).run_continuous(cancel).await;
        }
        Command::Run { sequential: false } => {
            info!(
                "Starting daemon: {} conversion workers, {} report workers",
                settings.schedule.conversion_workers, settings.schedule.report_workers
            );
            Daemon::new(Arc::new(pipeline), settings.schedule.clone())
                .run(cancel)
                .await;
        }
        Command::Once => {
            let summary = pipeline.run_cycle(&cancel).await.context("Pass failed")?;
            println!(
                "{} leaves: {} converted ({} failed), {} reports rendered ({} failed), {} condition reports rendered ({} failed)",
                summary.pass.leaves,
                summary.conversion.converted,
                summary.conversion.failed,
                summary.report.rendered,
                summary.report.failed,
                summary.condition.rendered,
                summary.condition.failed
            );
        }
        Command::Scan => {
            let found = pipeline.discover(&cancel).await.context("Pass failed")?;
            println!("To convert ({}):", found.lists.conversion.len());
            for item in &found.lists.conversion {
                println!("  {}", item.raw_path.display());
            }
            println!("To report ({}):", found.lists.report.len());
            for item in &found.lists.report {
                println!("  {}", item.raw_path.display());
            }
            println!("Condition artifacts ({}):", found.lists.condition.len());
            for item in &found.lists.condition {
                println!("  {}", item.artifact.display());
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing in-flight work");
        },
        _ = terminate => {
            info!("Received terminate signal, finishing in-flight work");
        },
    }
}
