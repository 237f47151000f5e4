//! Shutdown coordination for the duplex session.
//!
//! A single monotone signal: it starts "running" and can only move to
//! "stopped". Both halves of the session hold a clone, check it before each
//! blocking operation, and race their blocking reads against
//! [`Shutdown::triggered`] so a stop from the other half wakes them.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared stop signal.
///
/// Clones observe and trigger the same signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    stopped: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a signal in the running state.
    pub fn new() -> Self {
        let (stopped, _) = watch::channel(false);
        Self { stopped: Arc::new(stopped) }
    }

    /// Move to the stopped state.
    ///
    /// Idempotent. Returns `true` if this call performed the transition.
    pub fn trigger(&self) -> bool {
        let changed = self.stopped.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
        if changed {
            tracing::debug!("Session shutdown triggered");
        }
        changed
    }

    /// Whether the signal has been triggered.
    pub fn is_triggered(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Resolve once the signal has been triggered.
    ///
    /// Resolves immediately if it already was. Cancel-safe.
    pub async fn triggered(&self) {
        let mut rx = self.stopped.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed
        // channel here.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn trigger_is_monotone() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        assert!(shutdown.trigger());
        assert!(shutdown.is_triggered());

        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn clones_share_the_signal() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();
        other.trigger();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn triggered_resolves_immediately_when_stopped() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(100), shutdown.triggered())
            .await
            .expect("already-triggered signal should resolve");
    }

    #[tokio::test]
    async fn triggered_wakes_waiting_task() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.triggered().await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
