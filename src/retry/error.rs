use thiserror::Error;

/// Why [`RetryConfig::run`](super::RetryConfig::run) gave up.
///
/// Every variant carries the error of the last attempt.
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("retry count exhausted after {attempts} attempts, last error: {last:#}")]
    Exhausted { attempts: u32, last: anyhow::Error },

    /// The retry predicate classified the error as permanent
    #[error("{0:#}")]
    Rejected(anyhow::Error),

    #[error("retry cancelled, last error: {0:#}")]
    Cancelled(anyhow::Error),

    #[error("retry start timeout elapsed, last error: {0:#}")]
    TimedOut(anyhow::Error),
}

impl RetryError {
    /// The last attempt's error
    pub fn into_inner(self) -> anyhow::Error {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Rejected(e) | RetryError::Cancelled(e) | RetryError::TimedOut(e) => e,
        }
    }

    pub fn last_error(&self) -> &anyhow::Error {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Rejected(e) | RetryError::Cancelled(e) | RetryError::TimedOut(e) => e,
        }
    }
}
