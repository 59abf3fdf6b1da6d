//! Well-known state keys.
//!
//! The first three are owned by the runner. Steps may read them but any
//! attempt to write or remove them panics.

use super::StateKey;
use crate::step::CleanupWarnings;
use crate::ui::Ui;
use std::sync::Arc;

/// Set to `true` once a cancel request has been observed
pub const CANCELLED: StateKey<bool> = StateKey::new("multistep_cancelled");

/// Set to `true` when a step returned [`crate::StepAction::Halt`]
pub const HALTED: StateKey<bool> = StateKey::new("multistep_halted");

/// Name of the step that halted the run
pub const HALTED_STEP: StateKey<String> = StateKey::new("multistep_halted_step");

/// The error that made a step halt
pub const ERROR: StateKey<anyhow::Error> = StateKey::new("error");

/// User-facing output sink
pub const UI: StateKey<Arc<dyn Ui>> = StateKey::new("ui");

/// Cleanup failures reported by steps
pub const CLEANUP_WARNINGS: StateKey<CleanupWarnings> =
    StateKey::new("multistep_cleanup_warnings");

const RESERVED: [&str; 3] = [CANCELLED.name(), HALTED.name(), HALTED_STEP.name()];

/// Whether `key` is owned by the runner
pub fn is_reserved(key: &str) -> bool {
    RESERVED.contains(&key)
}
