use clap::Parser;
use rolling_snapshots::backup::backup_config::BackupConfig;
use rolling_snapshots::backup::scheduler::run_all;
use std::path::PathBuf;
use std::process::exit;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Keeps numbered zip snapshots of files that keep changing
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let config = match BackupConfig::from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let mut workers = tokio::spawn({
        let cancel = cancel.clone();
        async move { run_all(&config, cancel).await }
    });

    let results = tokio::select! {
        _ = shutdown_signal() => {
            cancel.cancel();
            (&mut workers).await
        }
        results = &mut workers => results,
    };

    match results {
        Ok(results) if results.iter().all(Result::is_ok) => info!("Shutdown complete"),
        Ok(_) => exit(1),
        Err(e) => {
            error!("Backup workers panicked: {e}");
            exit(1);
        }
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
