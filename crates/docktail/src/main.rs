mod cli;
mod error;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docktail_core::Driver;
use docktail_docker::DockerHandle;

use crate::cli::Cli;
use crate::error::DaemonError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(&cli.log_level);

    if let Err(err) = run(cli).await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), DaemonError> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting docktail");

    let config = cli.reconciler_config();
    info!(
        reconcile_interval = ?config.reconcile_interval,
        tailscale_socket = %cli.tailscale_socket.display(),
        control_plane_sync = config.api_key.is_some(),
        default_tags = ?config.default_tags,
        "configuration loaded"
    );

    let docker = DockerHandle::connect().map_err(DaemonError::DockerConnect)?;
    info!("Docker client initialized");

    let cancel = CancellationToken::new();
    wire_signals(cancel.clone())?;

    let driver = Driver::new(docker, config, cancel)?;

    info!("starting reconciliation loop");
    driver.run().await?;

    info!("docktail stopped");
    Ok(())
}

/// Cancel the root token on SIGINT or SIGTERM. Installing the handlers can
/// fail (exotic environments); that is a fatal setup error.
#[cfg(unix)]
fn wire_signals(cancel: CancellationToken) -> Result<(), DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!(signal = "SIGINT", "received shutdown signal"),
            _ = sigterm.recv() => info!(signal = "SIGTERM", "received shutdown signal"),
        }
        cancel.cancel();
    });

    Ok(())
}

#[cfg(not(unix))]
fn wire_signals(cancel: CancellationToken) -> Result<(), DaemonError> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(signal = "ctrl-c", "received shutdown signal");
        }
        cancel.cancel();
    });
    Ok(())
}
