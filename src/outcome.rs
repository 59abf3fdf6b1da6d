//! Reading the result of a finished run back out of the state bag

use crate::error::BuildError;
use crate::state::{keys, StateBag};
use crate::step::CleanupWarning;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    Completed,
    Failed,
    Cancelled,
    Halted,
}

/// Summary of a finished run.
///
/// The primary outcome is decided in this order: a recorded error, then
/// cancellation, then a halt without an error. Cleanup warnings are
/// reported alongside whatever the outcome is.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub outcome: BuildOutcome,
    pub failed_step: Option<String>,
    pub error: Option<Arc<anyhow::Error>>,
    pub cleanup_warnings: Vec<CleanupWarning>,
}

impl BuildReport {
    pub fn from_state(state: &StateBag) -> Self {
        let error = keys::ERROR.get_ok(state);
        let failed_step = keys::HALTED_STEP.get_ok(state).map(|s| s.to_string());
        let cleanup_warnings = keys::CLEANUP_WARNINGS
            .get_ok(state)
            .map(|w| w.snapshot())
            .unwrap_or_default();

        let outcome = if error.is_some() {
            BuildOutcome::Failed
        } else if state.is_cancelled() {
            BuildOutcome::Cancelled
        } else if state.is_halted() {
            BuildOutcome::Halted
        } else {
            BuildOutcome::Completed
        };

        Self {
            outcome,
            failed_step,
            error,
            cleanup_warnings,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == BuildOutcome::Completed
    }

    /// The cleanup warnings on success, the primary failure otherwise
    pub fn into_result(self) -> Result<Vec<CleanupWarning>, BuildError> {
        match self.outcome {
            BuildOutcome::Completed => Ok(self.cleanup_warnings),
            BuildOutcome::Cancelled => Err(BuildError::Cancelled),
            BuildOutcome::Halted => Err(BuildError::Halted {
                step: self.failed_step.unwrap_or_else(|| "unknown".to_string()),
            }),
            BuildOutcome::Failed => match self.error {
                Some(error) => Err(BuildError::StepFailed {
                    step: self.failed_step,
                    error,
                }),
                None => Err(BuildError::Halted {
                    step: self.failed_step.unwrap_or_else(|| "unknown".to_string()),
                }),
            },
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.outcome, &self.error) {
            (BuildOutcome::Failed, Some(error)) => match &self.failed_step {
                Some(step) => write!(f, "Build errored in step {step}: {error:#}")?,
                None => write!(f, "Build errored: {error:#}")?,
            },
            (BuildOutcome::Cancelled, _) => write!(f, "Build was cancelled")?,
            (BuildOutcome::Halted, _) => write!(
                f,
                "Build was halted by step {}",
                self.failed_step.as_deref().unwrap_or("unknown")
            )?,
            _ => write!(f, "Build finished")?,
        }

        if !self.cleanup_warnings.is_empty() {
            write!(f, "\nSome resources could not be cleaned up:")?;
            for warning in &self.cleanup_warnings {
                write!(f, "\n  {warning}")?;
            }
        }
        Ok(())
    }
}
