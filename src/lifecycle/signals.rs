//! OS signal handling.
//!
//! Ctrl+C (SIGINT) is translated into a [`Shutdown`] trigger. If the handler
//! cannot be installed the process keeps running and only logs the failure.

use crate::lifecycle::shutdown::Shutdown;

/// Wait for Ctrl+C.
pub async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Trigger `shutdown` on Ctrl+C.
pub fn forward_ctrl_c(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_ctrl_c().await;
        shutdown.trigger();
    })
}
