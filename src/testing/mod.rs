//! Testing utilities
//!
//! Mocks shared by the unit tests and the integration tests under `tests/`.

pub mod mocks;

pub use mocks::step::{CallLog, RecordingStep};
pub use mocks::ui::MockUi;
