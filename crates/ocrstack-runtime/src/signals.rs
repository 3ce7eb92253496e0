//! OS termination signals mapped onto a cancellation token.

use std::io;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Install signal handlers and return the token they cancel.
///
/// On Unix both SIGINT and SIGTERM request shutdown; elsewhere Ctrl-C
/// does. Handlers are installed before this function returns, so a
/// signal arriving right after cannot be lost. Repeated signals after
/// the first are absorbed by the already-cancelled token.
pub fn spawn_signal_listener() -> io::Result<CancellationToken> {
    let token = CancellationToken::new();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
            trigger.cancel();
        });
    }

    #[cfg(not(unix))]
    {
        let trigger = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl-C, shutting down");
                trigger.cancel();
            }
        });
    }

    Ok(token)
}
