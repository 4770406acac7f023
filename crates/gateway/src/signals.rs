//! Termination signals for the gateway binary.

use std::io;
use tokio::signal;

/// Resolves with the name of the first termination signal the process
/// receives: SIGINT or SIGTERM on Unix, Ctrl+C elsewhere.
///
/// The gateway awaits this twice. The first signal starts a graceful drain,
/// the second aborts it.
pub async fn termination_signal() -> io::Result<&'static str> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = interrupt.recv() => Ok("SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
}
