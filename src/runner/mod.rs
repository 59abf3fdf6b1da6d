//! Sequential step runner
//!
//! [`Runner::run`] executes its steps in order against one [`StateBag`] and
//! then cleans up every step it started, in reverse order. [`Runner::cancel`]
//! may be called concurrently from another task; cancellation is cooperative
//! and observed only between steps.
//!
//! ## Guarantees
//!
//! - `run` is invoked strictly in list order.
//! - `cleanup` is invoked for exactly the steps whose `run` was invoked, in
//!   reverse order. This holds when a step halts, when the run is cancelled
//!   and when a step's `run` panics (the panic resumes after cleanup).
//! - Once `cancel` returns, every cleanup has run, the runner is idle again
//!   and [`keys::CANCELLED`] is set in the state bag.

mod debug;


pub use debug::{DebugLocation, DebugPause, UiDebugPause};

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::state::{keys, StateBag};
use crate::step::{Step, StepAction};
use crate::ui::Ui;
use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Observable lifecycle of a [`Runner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Cancelling,
}

enum Control {
    Idle,
    Running {
        cancel: CancelToken,
        done: watch::Receiver<bool>,
    },
    Cancelling {
        done: watch::Receiver<bool>,
    },
}

/// Executes an ordered list of steps with cancellation and guaranteed cleanup
pub struct Runner {
    steps: tokio::sync::Mutex<Vec<Box<dyn Step>>>,
    control: Mutex<Control>,
    pause: Option<Arc<dyn DebugPause>>,
}

impl Runner {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps: tokio::sync::Mutex::new(steps),
            control: Mutex::new(Control::Idle),
            pause: None,
        }
    }

    /// Runner for `steps` that prompts on `ui` between steps when
    /// [`EngineConfig::debug`] is set
    pub fn from_config(steps: Vec<Box<dyn Step>>, config: &EngineConfig, ui: Arc<dyn Ui>) -> Self {
        let runner = Self::new(steps);
        if config.debug {
            debug!("Debug mode on, pausing between steps");
            return runner.with_debug_pause(Arc::new(UiDebugPause::new(ui)));
        }
        runner
    }

    /// Pause after each step's `run` and before each step's `cleanup`
    pub fn with_debug_pause(mut self, pause: Arc<dyn DebugPause>) -> Self {
        self.pause = Some(pause);
        self
    }

    pub fn state(&self) -> RunState {
        match *self.lock_control() {
            Control::Idle => RunState::Idle,
            Control::Running { .. } => RunState::Running,
            Control::Cancelling { .. } => RunState::Cancelling,
        }
    }

    /// Run every step against `state`, then clean up.
    ///
    /// Returns once all cleanups have finished. Whether the run completed,
    /// halted or was cancelled is recorded in `state` (see
    /// [`crate::BuildReport`]).
    ///
    /// # Panics
    ///
    /// Panics if a run is already active on this runner. A panic raised by a
    /// step's `run` is resumed after cleanup.
    pub async fn run(&self, state: &StateBag) {
        let (cancel, done_tx, done_rx) = self.begin();
        let guard = RunGuard {
            control: &self.control,
            done: done_tx,
            cancel: cancel.clone(),
            state: state.clone(),
        };

        let watcher = tokio::spawn(watch_for_cancel(cancel.clone(), done_rx, state.clone()));

        let run_id = Uuid::new_v4();
        let panic_payload = self
            .execute(state, &cancel)
            .instrument(info_span!("run", run_id = %run_id))
            .await;

        drop(guard);
        if let Err(e) = watcher.await {
            warn!("Cancellation watcher failed: {}", e);
        }

        if let Some(payload) = panic_payload {
            panic::resume_unwind(payload);
        }
    }

    /// Request cancellation and wait for the active run to unwind.
    ///
    /// Returns immediately when no run is active. The step currently running
    /// is not interrupted; the run stops at the next step boundary.
    ///
    /// Must not be awaited from inside a step of this runner, since the run
    /// cannot unwind until that step returns.
    pub async fn cancel(&self) {
        let mut done = {
            let mut control = self.lock_control();
            let (token, done) = match &*control {
                Control::Idle => return,
                Control::Running { cancel, done } => (Some(cancel.clone()), done.clone()),
                Control::Cancelling { done } => (None, done.clone()),
            };
            if let Some(token) = token {
                info!("Cancelling the step runner");
                token.cancel();
                *control = Control::Cancelling { done: done.clone() };
            }
            done
        };

        // The run guard always publishes `true` before dropping the sender.
        let _ = done.wait_for(|finished| *finished).await;
    }

    fn begin(&self) -> (CancelToken, watch::Sender<bool>, watch::Receiver<bool>) {
        let mut control = self.lock_control();
        if !matches!(*control, Control::Idle) {
            drop(control);
            panic!("Runner::run called while a run is already active");
        }

        let cancel = CancelToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        *control = Control::Running {
            cancel: cancel.clone(),
            done: done_rx.clone(),
        };
        (cancel, done_tx, done_rx)
    }

    async fn execute(
        &self,
        state: &StateBag,
        cancel: &CancelToken,
    ) -> Option<Box<dyn Any + Send>> {
        let mut steps = self.steps.lock().await;
        info!("Running {} steps", steps.len());

        let mut invoked: Vec<usize> = Vec::with_capacity(steps.len());
        let mut panic_payload = None;

        for index in 0..steps.len() {
            if observe_cancel(state, cancel) {
                info!("Run cancelled before step {}", index + 1);
                break;
            }

            let step = &mut steps[index];
            let name = step.name().to_string();

            // Scheduled before `run` so a panicking step is still cleaned up.
            invoked.push(index);
            debug!(step = %name, "Running step");

            let action = match AssertUnwindSafe(step.run(state)).catch_unwind().await {
                Ok(action) => action,
                Err(payload) => {
                    error!(step = %name, "Step panicked, cleaning up before resuming");
                    panic_payload = Some(payload);
                    break;
                }
            };

            self.pause(DebugLocation::AfterRun, &name, state, cancel)
                .await;

            if observe_cancel(state, cancel) {
                info!(step = %name, "Run cancelled");
                break;
            }

            if action == StepAction::Halt {
                info!(step = %name, "Step halted the run");
                state.put_reserved(keys::HALTED.name(), true);
                state.put_reserved(keys::HALTED_STEP.name(), name);
                break;
            }
        }

        for &index in invoked.iter().rev() {
            let step = &mut steps[index];
            let name = step.name().to_string();

            self.pause(DebugLocation::BeforeCleanup, &name, state, cancel)
                .await;

            debug!(step = %name, "Cleaning up step");
            if AssertUnwindSafe(step.cleanup(state))
                .catch_unwind()
                .await
                .is_err()
            {
                error!(step = %name, "Step cleanup panicked");
            }
        }

        panic_payload
    }

    async fn pause(
        &self,
        location: DebugLocation,
        step: &str,
        state: &StateBag,
        cancel: &CancelToken,
    ) {
        let Some(pause) = &self.pause else {
            return;
        };
        if cancel.is_cancelled() {
            return;
        }

        tokio::select! {
            _ = pause.pause(location, step, state) => {}
            _ = cancel.cancelled() => debug!(step, "Debug pause interrupted by cancel"),
        }
    }

    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resets the runner and publishes completion, even if the run future is
/// dropped part way through.
///
/// The cancel flag is written under the control lock, so a `cancel` that
/// saw `Running` always finds it set once `done` is published.
struct RunGuard<'a> {
    control: &'a Mutex<Control>,
    done: watch::Sender<bool>,
    cancel: CancelToken,
    state: StateBag,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancel.is_cancelled() {
            self.state.put_reserved(keys::CANCELLED.name(), true);
        }
        *control = Control::Idle;
        drop(control);
        self.done.send_replace(true);
    }
}

/// Whether the run should stop at this boundary.
///
/// The watcher normally writes the flag, but the loop may reach a boundary
/// before the watcher task has been scheduled, so the token is checked too.
fn observe_cancel(state: &StateBag, cancel: &CancelToken) -> bool {
    if state.is_cancelled() {
        return true;
    }
    if cancel.is_cancelled() {
        state.put_reserved(keys::CANCELLED.name(), true);
        return true;
    }
    false
}

async fn watch_for_cancel(cancel: CancelToken, mut done: watch::Receiver<bool>, state: StateBag) {
    let cancelled = tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = done.wait_for(|finished| *finished) => false,
    };

    if cancelled {
        debug!("Cancel requested, flagging state");
        state.put_reserved(keys::CANCELLED.name(), true);
        let _ = done.wait_for(|finished| *finished).await;
    }
}
