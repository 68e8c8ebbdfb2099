//! Signal handling for graceful shutdown.
//!
//! Waits for SIGINT or SIGTERM on Unix and Ctrl+C on Windows.

use crate::shutdown::ShutdownState;
use tokio::signal;
use tracing::info;

/// Waits for a termination signal, then initiates shutdown on `state`.
pub async fn wait_for_shutdown_signal(state: &ShutdownState) -> std::io::Result<()> {
    wait_for_signal_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    state.initiate_shutdown();
    Ok(())
}

/// Waits for a termination signal without logging or touching shutdown state.
pub async fn wait_for_signal_silent() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
