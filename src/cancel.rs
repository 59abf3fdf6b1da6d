//! One-shot cancellation signal.
//!
//! A [`CancelToken`] is fired at most once and can be observed by any number
//! of clones, either by polling [`CancelToken::is_cancelled`] or by awaiting
//! [`CancelToken::cancelled`]. The runner creates one per run for its cancel
//! request; steps hand one to [`crate::retry::RetryConfig::run`] as the
//! external cancellation context.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation signal backed by a `watch` channel that is set once.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal.
    ///
    /// Returns `true` if this call fired it, `false` if it was already fired.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    /// Whether the signal has been fired
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has been fired
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
