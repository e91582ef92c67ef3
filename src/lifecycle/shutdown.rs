//! Signal handling for graceful shutdown

use std::io;

use tracing::{debug, warn};

/// Which signal asked us to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
}

/// Wait for Ctrl-C, or SIGTERM on unix.
///
/// If a handler cannot be installed the error is logged and that signal is
/// simply never observed.
pub async fn wait_for_shutdown() -> ShutdownReason {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(?e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            debug!("received interrupt");
            ShutdownReason::Interrupt
        }
        result = terminate() => {
            if let Err(e) = result {
                warn!(?e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
            debug!("received SIGTERM");
            ShutdownReason::Terminate
        }
    }
}

#[cfg(unix)]
async fn terminate() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> io::Result<()> {
    std::future::pending().await
}
