//! Retry policy for individual operations inside a step
//!
//! [`RetryConfig::run`] retries one fallible async operation until it
//! succeeds, its error is rejected by the predicate, the attempt budget runs
//! out, the caller's [`CancelToken`](crate::CancelToken) fires or the start
//! timeout elapses. Whole step sequences are never retried.
//!
//! ```ignore
//! let mut backoff = Backoff::new(Duration::from_millis(200), Duration::from_secs(30), 2.0);
//! let instance = RetryConfig::new()
//!     .with_tries(11)
//!     .with_should_retry(|e| e.to_string().contains("InvalidParameterValue"))
//!     .with_backoff(backoff)
//!     .run(&cancel, || driver.request_spot_instance(&request))
//!     .await
//!     .map_err(RetryError::into_inner)?;
//! ```

mod backoff;
mod config;
mod error;
mod settings;

pub use backoff::Backoff;
pub use config::{RetryConfig, DEFAULT_RETRY_DELAY};
pub use error::RetryError;
pub use settings::{BackoffSettings, RetrySettings};
