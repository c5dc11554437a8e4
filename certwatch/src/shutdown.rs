//! Drives graceful shutdown when the process receives a signal.

use thiserror::Error;
use tracing::{debug, info};

mod signals;

pub use drain::Watch;

/// Drives shutdown by watching signals.
#[derive(Debug)]
#[must_use = "call `Shutdown::signaled` to await a signal"]
pub struct Shutdown {
    signals: signals::Signals,
    tx: drain::Signal,
}

/// Indicates that a signal handler could not be registered.
#[derive(Debug, Error)]
#[error("failed to register signal handler: {0}")]
pub struct RegisterError(#[from] std::io::Error);

/// Indicates that shutdown was forced by a second signal before all watches
/// were released.
#[derive(Copy, Clone, Debug, Error)]
#[error("process aborted by signal")]
pub struct Aborted(());

/// Creates a shutdown channel.
///
/// [`Shutdown`] watches for `SIGINT` and `SIGTERM` signals (or Ctrl-C and
/// Ctrl-Break on Windows). When a signal is received, [`Watch`] instances are
/// notified and, when all watches are dropped, the shutdown is completed. If a
/// second signal is received while waiting for watches to be dropped, the
/// shutdown is aborted.
pub fn sigint_or_sigterm() -> Result<(Shutdown, Watch), RegisterError> {
    let signals = signals::Signals::new()?;
    let (tx, rx) = drain::channel();
    Ok((Shutdown { signals, tx }, rx))
}

impl Shutdown {
    /// Watches for signals and drives shutdown.
    ///
    /// Completes once all [`Watch`] instances have been released. If a second
    /// signal is received first, [`Aborted`] is returned.
    pub async fn signaled(self) -> Result<(), Aborted> {
        let Self { mut signals, tx } = self;

        signals.recv().await;
        info!("Received shutdown signal; waiting for the current scan to complete");

        tokio::select! {
            _ = tx.drain() => {
                debug!("Drained");
                Ok(())
            },

            _ = signals.recv() => {
                info!("Received a second signal; aborting");
                Err(Aborted(()))
            }
        }
    }
}
