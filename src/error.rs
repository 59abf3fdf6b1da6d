use std::sync::Arc;
use thiserror::Error;

/// Why a build did not complete
#[derive(Error, Debug, Clone)]
pub enum BuildError {
    #[error(
        "Build failed{}: {error:#}",
        step.as_deref().map(|s| format!(" in step {s}")).unwrap_or_default()
    )]
    StepFailed {
        /// Step that halted with the error, when known
        step: Option<String>,
        error: Arc<anyhow::Error>,
    },

    #[error("Build was cancelled")]
    Cancelled,

    #[error("Build was halted by step {step}")]
    Halted { step: String },
}

impl BuildError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BuildError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_step_failed_message() {
        let err = BuildError::StepFailed {
            step: Some("StepCreateVm".to_string()),
            error: Arc::new(anyhow!("quota exceeded").context("Error creating VM")),
        };
        assert_eq!(
            err.to_string(),
            "Build failed in step StepCreateVm: Error creating VM: quota exceeded"
        );
    }

    #[test]
    fn test_step_failed_without_step() {
        let err = BuildError::StepFailed {
            step: None,
            error: Arc::new(anyhow!("boom")),
        };
        assert_eq!(err.to_string(), "Build failed: boom");
    }

    #[test]
    fn test_cancelled() {
        assert!(BuildError::Cancelled.is_cancelled());
        assert_eq!(BuildError::Cancelled.to_string(), "Build was cancelled");
    }
}
