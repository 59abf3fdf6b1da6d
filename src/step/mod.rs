//! The step abstraction
//!
//! A [`Step`] is one unit of forward work plus the cleanup that undoes it.
//! Steps are driven only through this trait; the runner knows nothing else
//! about them.
//!
//! Contract for implementors:
//! - `run` performs the forward action and returns [`StepAction::Continue`]
//!   or [`StepAction::Halt`]. To abort on error, record it with [`halt`].
//! - `cleanup` is called for every step whose `run` was called, whatever
//!   `run` returned and even if the run was cancelled. It must inspect state
//!   to decide whether its resource really exists, since `run` may have
//!   failed part way.
//! - `cleanup` never fails the run. Report problems with
//!   [`report_cleanup_failure`] and return.

mod conditional;
mod report;

pub use conditional::{when, NullStep};
pub use report::{halt, report_cleanup_failure, CleanupWarning, CleanupWarnings};

use crate::state::StateBag;
use async_trait::async_trait;

/// What the runner should do after a step's `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepAction {
    /// Proceed to the next step
    Continue,
    /// Stop the sequence after this step; cleanup still runs
    Halt,
}

/// A unit of work with a matching cleanup
#[async_trait]
pub trait Step: Send {
    /// Name used in logs and failure reports
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Perform the forward action
    async fn run(&mut self, state: &StateBag) -> StepAction;

    /// Release whatever `run` acquired
    async fn cleanup(&mut self, state: &StateBag);
}

/// `a::b::StepCreateDisk<c::D>` -> `StepCreateDisk`
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
