//! Shutdown signalling for the long-running `run` command.
//!
//! The first SIGINT / SIGTERM / SIGHUP cancels the returned token: the
//! generator and monitor loops stop and autosave performs its final flush.
//! A second signal exits immediately, skipping that flush.

use tokio_util::sync::CancellationToken;

/// Exit status used when the user insists on stopping before the final save.
const FORCED_EXIT_CODE: i32 = 130;

/// Spawn the signal listener and return the token it cancels.
pub(crate) fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handler_token = token.clone();

    tokio::spawn(async move {
        let mut received = 0u32;
        loop {
            if let Err(e) = wait_for_signal().await {
                tracing::warn!(error = %e, "Signal listener failed, shutting down");
                handler_token.cancel();
                return;
            }
            received += 1;

            if received == 1 {
                tracing::info!("Shutdown requested, flushing catalog to disk");
                tracing::info!("Send the signal again to exit without saving");
                handler_token.cancel();
            } else {
                tracing::warn!("Forced exit, unsaved changes are lost");
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = sigterm.recv() => Ok(()),
        _ = sighup.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
