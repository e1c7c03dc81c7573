//! SIGINT/SIGTERM handling, grounded on `cordelia-node::main`'s
//! `tokio::signal::ctrl_c().await?` wait, extended with a SIGTERM
//! branch (unix-only, matching spec.md section 6's "SIGINT/SIGTERM").

use tokio::signal::unix::{signal, SignalKind};

/// Waits for either signal. Both mean the same thing here: begin the
/// orderly shutdown sequence described in spec.md section 6.
pub async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(%err, "failed to install SIGTERM handler, relying on SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
    }
}
