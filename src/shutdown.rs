use tracing::{info, warn};

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(err), _) | (_, Err(err)) => {
            warn!(error = %err, "failed to install signal handlers, falling back to ctrl-c");
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received ctrl-c, initiating graceful shutdown");
            }
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
    }
}

/// Resolves on Ctrl+C.
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, initiating graceful shutdown"),
        Err(err) => warn!(error = %err, "failed to listen for ctrl-c"),
    }
}
