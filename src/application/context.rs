//! Per-call context
//!
//! Carries the lifetime of whoever issued the call: a station session for
//! inbound frames, a sync loop for deferred dispatches.

use std::future::Future;

use crate::shared::shutdown::ShutdownSignal;

#[derive(Clone, Default)]
pub struct CallContext {
    cancellation: ShutdownSignal,
}

impl CallContext {
    /// A context that is never cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context cancelled when `signal` (or any of its ancestors) fires.
    pub fn with_cancellation(signal: ShutdownSignal) -> Self {
        Self {
            cancellation: signal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_triggered()
    }

    pub async fn cancelled(&self) {
        self.cancellation.wait().await
    }

    /// Drive `fut` unless the context is cancelled first.
    ///
    /// On cancellation `fut` is dropped at its current await point;
    /// partially applied side effects are the caller's concern.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            out = fut => Some(out),
            _ = self.cancelled() => None,
        }
    }

    pub fn signal(&self) -> &ShutdownSignal {
        &self.cancellation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn run_completes_when_not_cancelled() {
        let ctx = CallContext::new();
        assert_eq!(ctx.run(async { 42 }).await, Some(42));
    }

    #[tokio::test]
    async fn run_returns_none_once_cancelled() {
        let signal = ShutdownSignal::new();
        let ctx = CallContext::with_cancellation(signal.clone());
        let slow = tokio::time::sleep(Duration::from_secs(60));
        let task = tokio::spawn(async move { ctx.run(slow).await });
        signal.trigger();
        let out = tokio::time::timeout(Duration::from_millis(200), task)
            .await
            .unwrap()
            .unwrap();
        assert!(out.is_none());
    }
}
