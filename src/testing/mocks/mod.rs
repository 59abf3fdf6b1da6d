//! Mock implementations of the collaborator traits

pub mod step;
pub mod ui;
