//! Waiting on a driver's completion signal
//!
//! Drivers that finish work in the background (an export, a shutdown, an
//! upload) hand the step a [`Completion`]. The step waits on it with a
//! bounded timeout instead of blocking the run forever.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Receiving half of a driver's completion signal
pub type Completion = oneshot::Receiver<anyhow::Result<()>>;

/// Sending half, kept by the driver
pub type CompletionSender = oneshot::Sender<anyhow::Result<()>>;

pub fn completion_channel() -> (CompletionSender, Completion) {
    oneshot::channel()
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Timeout waiting for {what} after {}", humantime_serde::re::humantime::format_duration(*timeout))]
    TimedOut { what: String, timeout: Duration },

    #[error("Error waiting for {what}: {error:#}")]
    Failed { what: String, error: anyhow::Error },

    #[error("{what} ended without reporting a result")]
    Dropped { what: String },
}

/// Wait up to `timeout` for `completion`. A zero timeout waits forever.
///
/// `what` names the awaited operation in errors, for example
/// `"the VM to shut down"`.
pub async fn wait_for_completion(
    completion: Completion,
    timeout: Duration,
    what: &str,
) -> Result<(), CompletionError> {
    let received = if timeout.is_zero() {
        completion.await
    } else {
        match tokio::time::timeout(timeout, completion).await {
            Ok(received) => received,
            Err(_) => {
                debug!(what, ?timeout, "Completion wait timed out");
                return Err(CompletionError::TimedOut {
                    what: what.to_string(),
                    timeout,
                });
            }
        }
    };

    match received {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(CompletionError::Failed {
            what: what.to_string(),
            error,
        }),
        Err(_) => Err(CompletionError::Dropped {
            what: what.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_completes() {
        let (tx, rx) = completion_channel();
        tokio::spawn(async move {
            let _ = tx.send(Ok(()));
        });

        assert!(wait_for_completion(rx, Duration::from_secs(5), "the export")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_times_out() {
        let (_tx, rx) = completion_channel();

        let err = wait_for_completion(rx, Duration::from_millis(10), "the VM to shut down")
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::TimedOut { .. }));
        assert_eq!(err.to_string(), "Timeout waiting for the VM to shut down after 10ms");
    }

    #[tokio::test]
    async fn test_propagates_driver_error() {
        let (tx, rx) = completion_channel();
        tx.send(Err(anyhow!("disk full"))).unwrap();

        let err = wait_for_completion(rx, Duration::ZERO, "the export")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Error waiting for the export: disk full");
    }

    #[tokio::test]
    async fn test_reports_dropped_sender() {
        let (tx, rx) = completion_channel();
        drop(tx);

        let err = wait_for_completion(rx, Duration::from_secs(5), "the upload")
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::Dropped { .. }));
    }
}
