//! Centralized shutdown management

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::task::TaskTracker;

/// Centralized shutdown service for coordinating graceful shutdown
///
/// Owns the tracker that detached cache writes are spawned on, so pending
/// writes get a bounded chance to land before the cache pool is dropped.
#[derive(Clone)]
pub struct ShutdownService {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    writes: TaskTracker,
    grace: Duration,
}

impl ShutdownService {
    pub fn new(grace: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            writes: TaskTracker::new(),
            grace,
        }
    }

    /// Tracker for fire-and-forget work that shutdown should wait for
    pub fn tracker(&self) -> TaskTracker {
        self.writes.clone()
    }

    /// Subscribe to shutdown signal
    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// Trigger shutdown
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Check if shutdown was triggered
    #[cfg(test)]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Trigger shutdown and wait for pending writes, at most `grace`
    ///
    /// Returns `false` if the grace period ran out first.
    pub async fn shutdown(&self) -> bool {
        tracing::debug!("Initiating graceful shutdown...");
        self.trigger();

        self.writes.close();
        tracing::debug!(
            count = self.writes.len(),
            "Waiting for pending cache writes..."
        );

        match tokio::time::timeout(self.grace, self.writes.wait()).await {
            Ok(()) => {
                tracing::debug!("All pending cache writes completed");
                true
            }
            Err(_) => {
                tracing::warn!(
                    grace_secs = self.grace.as_secs(),
                    pending = self.writes.len(),
                    "Timeout waiting for pending cache writes"
                );
                false
            }
        }
    }

    /// Wait for shutdown signal (for use with axum graceful shutdown)
    /// Returns an owned future that can be passed to graceful_shutdown
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.rx.clone();
        async move {
            let _ = rx.wait_for(|&v| v).await;
        }
    }

    /// Install OS signal handlers and auto-trigger on Ctrl+C/SIGTERM
    pub fn install_signal_handlers(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to install Ctrl+C handler");
            };

            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to install SIGTERM handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
                _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
            }

            service.trigger();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_not_triggered_initially() {
        let shutdown = ShutdownService::new(Duration::from_secs(1));
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_shutdown_wait_returns_after_trigger() {
        let shutdown = ShutdownService::new(Duration::from_secs(1));
        let handle = tokio::spawn(shutdown.wait());

        tokio::task::yield_now().await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_receives_shutdown() {
        let shutdown = ShutdownService::new(Duration::from_secs(1));
        let rx = shutdown.subscribe();

        assert!(!*rx.borrow());
        shutdown.trigger();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_pending_writes() {
        let shutdown = ShutdownService::new(Duration::from_secs(5));
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let flag = Arc::clone(&done);
        shutdown.tracker().spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        assert!(shutdown.shutdown().await);
        assert!(done.load(std::sync::atomic::Ordering::SeqCst));
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_grace() {
        let shutdown = ShutdownService::new(Duration::from_millis(20));
        shutdown
            .tracker()
            .spawn(tokio::time::sleep(Duration::from_secs(3600)));

        assert!(!shutdown.shutdown().await);
    }
}
