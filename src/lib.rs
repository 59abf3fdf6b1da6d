//! # multistep
//!
//! Sequential build-step orchestration with cooperative cancellation,
//! guaranteed reverse-order cleanup and a retry/backoff policy for the
//! remote calls steps make.
//!
//! ## Usage
//!
//! ```ignore
//! let state = StateBag::new();
//! keys::UI.put(&state, Arc::new(ConsoleUi::with_prefix("qemu")) as Arc<dyn Ui>);
//! state.put("config", config);
//!
//! let runner = Arc::new(Runner::new(vec![
//!     Box::new(StepCreateDisk::new()),
//!     when(!config.floppy_files.is_empty(), StepCreateFloppy::new()),
//!     Box::new(StepRunVm::new()),
//! ]));
//! let _interrupts = signal::cancel_on_interrupt(runner.clone())?;
//!
//! runner.run(&state).await;
//! let warnings = BuildReport::from_state(&state).into_result()?;
//! ```
//!
//! ## Modules
//!
//! - `state` - Shared state bag scoped to one run, with typed well-known keys
//! - `step` - The `Step` trait and helpers for halting and cleanup failures
//! - `runner` - Runs steps in order, cancels and cleans up in reverse
//! - `retry` - Retry policy and backoff for fallible operations inside a step
//! - `cancel` - One-shot cancellation token
//! - `completion` - Bounded waits on a driver's completion signal
//! - `outcome` - Build report read back from the state bag
//! - `config` - Engine configuration from TOML and environment
//! - `signal` - SIGINT/SIGTERM to `Runner::cancel`
//! - `testing` - Mocks for step and runner tests

pub mod cancel;
pub mod completion;
pub mod config;
pub mod error;
pub mod logging;
pub mod outcome;
pub mod retry;
pub mod runner;
pub mod signal;
pub mod state;
pub mod step;
pub mod ui;

pub mod testing;

pub use cancel::CancelToken;
pub use config::{ConfigError, EngineConfig};
pub use error::BuildError;
pub use outcome::{BuildOutcome, BuildReport};
pub use retry::{Backoff, RetryConfig, RetryError};
pub use runner::{DebugLocation, DebugPause, RunState, Runner, UiDebugPause};
pub use state::{keys, StateBag, StateKey};
pub use step::{halt, report_cleanup_failure, when, CleanupWarning, Step, StepAction};
pub use ui::{ConsoleUi, Ui};
