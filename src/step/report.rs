//! Error and cleanup-failure reporting for steps

use super::StepAction;
use crate::state::{keys, StateBag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{error, warn};

/// Record `err` as the reason for halting and return [`StepAction::Halt`].
///
/// The error goes to the UI (if one is in the state bag) and into
/// [`keys::ERROR`]. If an error is already recorded it is kept, so the
/// first failure is the one reported.
///
/// ```ignore
/// let disk = match driver.create_disk(&config).await {
///     Ok(disk) => disk,
///     Err(e) => return halt(state, e.context("Error creating disk")),
/// };
/// ```
pub fn halt(state: &StateBag, err: anyhow::Error) -> StepAction {
    let message = format!("{err:#}");
    if let Some(ui) = keys::UI.get_ok(state) {
        ui.error(&message);
    }
    error!(error = %message, "Step halted");

    keys::ERROR.get_or_insert_with(state, || err);
    StepAction::Halt
}

/// Report a resource that a step's cleanup could not release.
///
/// Cleanup failures never abort the run; they are shown to the user,
/// logged, and kept under [`keys::CLEANUP_WARNINGS`] so the final report can
/// list them after the primary error.
pub fn report_cleanup_failure(
    state: &StateBag,
    step: &str,
    resource: &str,
    err: &anyhow::Error,
) {
    let warning = CleanupWarning::new(step, resource, err);
    if let Some(ui) = keys::UI.get_ok(state) {
        ui.error(&warning.message);
    }
    let detail = format!("{err:#}");
    warn!(step, resource, error = %detail, "Cleanup failed");

    keys::CLEANUP_WARNINGS
        .get_or_insert_with(state, CleanupWarnings::default)
        .push(warning);
}

/// One resource left behind by a failed cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupWarning {
    pub step: String,
    pub resource: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl CleanupWarning {
    pub fn new(step: &str, resource: &str, err: &anyhow::Error) -> Self {
        Self {
            step: step.to_string(),
            resource: resource.to_string(),
            message: format!(
                "Error cleaning up {resource}: {err:#}. Please remove it manually."
            ),
            at: Utc::now(),
        }
    }
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.step, self.message)
    }
}

/// Append-only list of cleanup warnings shared through the state bag
#[derive(Debug, Default)]
pub struct CleanupWarnings {
    entries: Mutex<Vec<CleanupWarning>>,
}

impl CleanupWarnings {
    pub fn push(&self, warning: CleanupWarning) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning);
    }

    /// Copy of the warnings in the order they were reported
    pub fn snapshot(&self) -> Vec<CleanupWarning> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
