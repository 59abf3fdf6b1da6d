//! Recording step for runner tests

use crate::state::StateBag;
use crate::step::{halt, report_cleanup_failure, Step, StepAction};
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Ordered record of step calls shared by several [`RecordingStep`]s.
///
/// Entries look like `run:StepA` and `cleanup:StepA`.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Names of the steps whose `run` was called, in call order
    pub fn runs(&self) -> Vec<String> {
        self.with_prefix("run:")
    }

    /// Names of the steps whose `cleanup` was called, in call order
    pub fn cleanups(&self) -> Vec<String> {
        self.with_prefix("cleanup:")
    }

    fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

enum Behavior {
    Return(StepAction),
    Fail(String),
    Panic,
    WaitForCancel(Arc<Notify>),
}

/// Step that logs its calls to a [`CallLog`] and then behaves as configured
pub struct RecordingStep {
    name: String,
    log: CallLog,
    behavior: Behavior,
    cleanup_failure: Option<(String, String)>,
}

impl RecordingStep {
    /// Step whose `run` returns [`StepAction::Continue`]
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            behavior: Behavior::Return(StepAction::Continue),
            cleanup_failure: None,
        }
    }

    /// Step whose `run` returns [`StepAction::Halt`] without recording an error
    pub fn halting(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            behavior: Behavior::Return(StepAction::Halt),
            ..Self::new(name, log)
        }
    }

    /// Step whose `run` fails through [`halt`] with `message`
    pub fn failing(name: impl Into<String>, log: &CallLog, message: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail(message.into()),
            ..Self::new(name, log)
        }
    }

    /// Step whose `run` panics
    pub fn panicking(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            behavior: Behavior::Panic,
            ..Self::new(name, log)
        }
    }

    /// Step whose `run` notifies `started`, then polls the state bag until
    /// the run is cancelled
    pub fn waiting_for_cancel(name: impl Into<String>, log: &CallLog, started: Arc<Notify>) -> Self {
        Self {
            behavior: Behavior::WaitForCancel(started),
            ..Self::new(name, log)
        }
    }

    /// Report a cleanup failure for `resource` from `cleanup`
    pub fn with_cleanup_failure(
        mut self,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.cleanup_failure = Some((resource.into(), message.into()));
        self
    }
}

#[async_trait]
impl Step for RecordingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self, state: &StateBag) -> StepAction {
        self.log.record(format!("run:{}", self.name));
        match &self.behavior {
            Behavior::Return(action) => *action,
            Behavior::Fail(message) => halt(state, anyhow!("{}", message)),
            Behavior::Panic => panic!("step {} panicked", self.name),
            Behavior::WaitForCancel(started) => {
                started.notify_one();
                while !state.is_cancelled() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                StepAction::Continue
            }
        }
    }

    async fn cleanup(&mut self, state: &StateBag) {
        self.log.record(format!("cleanup:{}", self.name));
        if let Some((resource, message)) = &self.cleanup_failure {
            report_cleanup_failure(state, &self.name, resource, &anyhow!("{}", message));
        }
    }
}
