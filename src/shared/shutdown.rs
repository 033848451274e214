//! Graceful shutdown and cancellation
//!
//! [`ShutdownSignal`] is shared by the process, each station session and
//! the sync loops. A session signal is a child of the server signal, so
//! triggering the server cancels every session while a single
//! disconnect only cancels its own work.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tracing::{info, warn};

/// Cloneable cancellation flag with async wait.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
    parent: Option<Arc<ShutdownSignal>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            parent: None,
        }
    }

    /// A signal that fires when either it or `self` is triggered.
    pub fn child(&self) -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow() || self.parent.as_ref().is_some_and(|p| p.is_triggered())
    }

    pub fn trigger(&self) {
        if !self.sender.send_replace(true) {
            info!("🛑 Shutdown signal triggered");
        }
    }

    /// Resolves once this signal or any ancestor is triggered.
    pub fn wait(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut rx = self.sender.subscribe();
            match &self.parent {
                Some(parent) => {
                    tokio::select! {
                        _ = rx.wait_for(|triggered| *triggered) => {}
                        _ = parent.wait() => {}
                    }
                }
                None => {
                    let _ = rx.wait_for(|triggered| *triggered).await;
                }
            }
        })
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Listen for OS shutdown signals (SIGTERM, SIGINT)
pub async fn listen_for_shutdown_signals(shutdown: ShutdownSignal) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("📡 Received SIGTERM signal"),
            _ = sigint.recv() => info!("📡 Received SIGINT signal (Ctrl+C)"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        info!("📡 Received Ctrl+C signal");
    }

    shutdown.trigger();
}

/// Owns the process-wide signal and bounds the cleanup phase.
pub struct ShutdownCoordinator {
    signal: ShutdownSignal,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            signal: ShutdownSignal::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    pub fn start_signal_listener(&self) {
        tokio::spawn(listen_for_shutdown_signals(self.signal.clone()));
    }

    /// Run `cleanup` after the signal fires. Returns `false` on timeout.
    pub async fn shutdown_with_cleanup<Fut>(&self, cleanup: Fut) -> bool
    where
        Fut: Future<Output = ()>,
    {
        self.signal.wait().await;
        info!("⏳ Starting graceful shutdown (timeout: {}s)...", self.timeout.as_secs());

        match tokio::time::timeout(self.timeout, cleanup).await {
            Ok(()) => {
                info!("✅ Graceful shutdown completed");
                true
            }
            Err(_) => {
                warn!("⚠️ Graceful shutdown timed out after {}s", self.timeout.as_secs());
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.wait().await });
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(200), task)
            .await
            .expect("wait did not resolve")
            .unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn wait_after_trigger_returns_immediately() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(50), signal.wait())
            .await
            .expect("already triggered signal must not block");
    }

    #[tokio::test]
    async fn parent_trigger_cancels_child() {
        let parent = ShutdownSignal::new();
        let child = parent.child();
        assert!(!child.is_triggered());
        parent.trigger();
        assert!(child.is_triggered());
        tokio::time::timeout(Duration::from_millis(50), child.wait())
            .await
            .expect("child should observe parent trigger");
    }

    #[test]
    fn child_trigger_leaves_parent_running() {
        let parent = ShutdownSignal::new();
        let child = parent.child();
        child.trigger();
        assert!(child.is_triggered());
        assert!(!parent.is_triggered());
    }
}
