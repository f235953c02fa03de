use std::{future::Future, io, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Longest uninterrupted wait inside [`Shutdown::sleep`].
const SLEEP_STEP: Duration = Duration::from_secs(1);

/// Process-wide stop flag shared by the loop, its sleeps and the liveness listener.
///
/// Triggering is one-way. Work already in flight is never interrupted; the loop observes the flag
/// between cycles.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelled on shutdown, for tasks that only need to await it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Sleep `total` in steps of at most one second, checking the flag between steps.
    ///
    /// Returns `true` if the full interval elapsed, `false` if shutdown cut it short.
    pub async fn sleep(&self, total: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.is_triggered() {
                return false;
            }
            let step = remaining.min(SLEEP_STEP);
            tokio::select! {
                _ = self.token.cancelled() => return false,
                _ = tokio::time::sleep(step) => {}
            }
            remaining -= step;
        }
        !self.is_triggered()
    }

    /// Trigger shutdown on SIGTERM or SIGINT.
    ///
    /// Handlers are registered before this returns, so a signal sent right after is not lost.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        self.trigger_on(os_signals())
    }

    /// Trigger shutdown once `signal` resolves. A listener error also triggers it.
    pub fn trigger_on<F>(&self, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = io::Result<&'static str>> + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                received = signal => match received {
                    Ok(name) => info!(signal = name, "shutdown signal received"),
                    Err(e) => warn!(error = %e, "signal listener failed; shutting down"),
                },
                _ = this.token.cancelled() => return,
            }
            this.trigger();
        })
    }
}

#[cfg(unix)]
fn os_signals() -> impl Future<Output = io::Result<&'static str>> + Send + 'static {
    use tokio::signal::unix::{SignalKind, signal};

    let installed = signal(SignalKind::terminate())
        .and_then(|term| Ok((term, signal(SignalKind::interrupt())?)));
    async move {
        let (mut term, mut int) = installed?;
        let name = tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        };
        Ok::<_, io::Error>(name)
    }
}

#[cfg(not(unix))]
fn os_signals() -> impl Future<Output = io::Result<&'static str>> + Send + 'static {
    async {
        tokio::signal::ctrl_c().await?;
        Ok::<_, io::Error>("ctrl-c")
    }
}
