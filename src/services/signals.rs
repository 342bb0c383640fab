//! Process signal handling and coordinated shutdown.

use std::process::ExitCode;
use std::time::Duration;

use tracing::info;

use crate::services::manager::ServiceManager;

/// Wait for SIGINT or SIGTERM, then drain services within the timeout.
pub async fn handle_shutdown_signals(manager: ServiceManager, timeout_secs: u64) -> ExitCode {
    wait_for_signal().await;
    info!("shutdown signal received");
    manager.shutdown(Duration::from_secs(timeout_secs)).await;
    info!("shutdown complete");
    ExitCode::SUCCESS
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
