use crate::state::StateBag;
use crate::ui::Ui;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Where in the step lifecycle a debug pause happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugLocation {
    AfterRun,
    BeforeCleanup,
}

impl fmt::Display for DebugLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugLocation::AfterRun => write!(f, "after run of"),
            DebugLocation::BeforeCleanup => write!(f, "before cleanup of"),
        }
    }
}

/// Hook that blocks the runner between steps until it returns.
///
/// A pending pause is abandoned when the run is cancelled.
#[async_trait]
pub trait DebugPause: Send + Sync {
    async fn pause(&self, location: DebugLocation, step: &str, state: &StateBag);
}

/// Pause that waits for the user to press enter
pub struct UiDebugPause {
    ui: Arc<dyn Ui>,
}

impl UiDebugPause {
    pub fn new(ui: Arc<dyn Ui>) -> Self {
        Self { ui }
    }
}

#[async_trait]
impl DebugPause for UiDebugPause {
    async fn pause(&self, location: DebugLocation, step: &str, _state: &StateBag) {
        let query = format!("Pausing {location} step '{step}'. Press enter to continue.");
        if let Err(e) = self.ui.ask(&query).await {
            warn!(step, "Debug pause prompt failed: {:#}", e);
        }
    }
}
