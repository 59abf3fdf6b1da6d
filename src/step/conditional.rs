use super::{Step, StepAction};
use crate::state::StateBag;
use async_trait::async_trait;

/// Include `step` only when `condition` holds.
///
/// Keeps step lists declarative when some steps depend on configuration:
///
/// ```ignore
/// let steps = vec![
///     Box::new(StepCreateDisk::new()) as Box<dyn Step>,
///     when(!config.floppy_files.is_empty(), StepCreateFloppy::new()),
/// ];
/// ```
pub fn when<S: Step + 'static>(condition: bool, step: S) -> Box<dyn Step> {
    if condition {
        Box::new(step)
    } else {
        Box::new(NullStep)
    }
}

/// Step that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStep;

#[async_trait]
impl Step for NullStep {
    async fn run(&mut self, _state: &StateBag) -> StepAction {
        StepAction::Continue
    }

    async fn cleanup(&mut self, _state: &StateBag) {}
}
