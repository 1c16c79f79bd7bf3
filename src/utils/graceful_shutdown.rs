use std::{
    future::Future,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{signal, sync::broadcast};

/// Represents different shutdown reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Graceful shutdown requested (SIGTERM, SIGINT)
    Graceful,
    /// The shutdown channel went away without a signal
    Force,
}

/// Fans a single OS shutdown signal out to every part of the process.
#[derive(Clone)]
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<ShutdownReason>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            shutdown_tx,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a receiver for shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.shutdown_tx.subscribe()
    }

    /// Check if shutdown has been initiated
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Relaxed)
    }

    /// Trigger shutdown without an OS signal. Only the first call has an effect.
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::info!(?reason, "Shutdown triggered");
            let _ = self.shutdown_tx.send(reason);
        } else {
            tracing::warn!("Shutdown already initiated, ignoring signal");
        }
    }

    /// Wait for SIGINT or SIGTERM and broadcast a graceful shutdown.
    pub async fn run_signal_handler(&self) -> io::Result<()> {
        tracing::info!("Signal handler started. Listening for SIGTERM and SIGINT");

        #[cfg(unix)]
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        #[cfg(unix)]
        let terminate = sigterm.recv();
        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        self.trigger_shutdown(ShutdownReason::Graceful);
        Ok(())
    }

    /// A future that completes once shutdown is requested.
    ///
    /// The receiver is created immediately, so a signal that arrives before
    /// the future is first polled is not missed.
    pub fn shutdown_signal(&self) -> impl Future<Output = ShutdownReason> + Send + 'static {
        let mut receiver = self.subscribe();
        let initiated = Arc::clone(&self.shutdown_initiated);

        async move {
            if initiated.load(Ordering::Relaxed) {
                return ShutdownReason::Graceful;
            }
            match receiver.recv().await {
                Ok(reason) => {
                    tracing::info!(?reason, "Shutdown signal received");
                    reason
                }
                Err(_) => {
                    tracing::warn!("Shutdown channel closed unexpectedly");
                    ShutdownReason::Force
                }
            }
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_graceful_shutdown_creation() {
        let shutdown = GracefulShutdown::new();
        assert!(!shutdown.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_manual_trigger_shutdown() {
        let shutdown = GracefulShutdown::new();
        let mut receiver = shutdown.subscribe();

        shutdown.trigger_shutdown(ShutdownReason::Graceful);
        assert!(shutdown.is_shutdown_initiated());
        assert_eq!(receiver.try_recv().unwrap(), ShutdownReason::Graceful);

        // second trigger is ignored
        shutdown.trigger_shutdown(ShutdownReason::Force);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_signal_resolves_after_trigger() {
        let shutdown = GracefulShutdown::new();
        let signal = shutdown.shutdown_signal();

        shutdown.trigger_shutdown(ShutdownReason::Graceful);

        let reason = tokio::time::timeout(Duration::from_secs(1), signal)
            .await
            .expect("shutdown future should resolve");
        assert_eq!(reason, ShutdownReason::Graceful);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let shutdown = GracefulShutdown::new();
        let mut receiver1 = shutdown.subscribe();
        let mut receiver2 = shutdown.subscribe();

        shutdown.trigger_shutdown(ShutdownReason::Graceful);

        assert_eq!(receiver1.try_recv().unwrap(), ShutdownReason::Graceful);
        assert_eq!(receiver2.try_recv().unwrap(), ShutdownReason::Graceful);
    }
}
