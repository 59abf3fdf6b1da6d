//! Shared state container for one build run
//!
//! A [`StateBag`] is created by whoever drives the build, filled with the
//! configuration and collaborator handles the steps need, then passed by
//! reference to every step. [`keys`] lists the keys this crate itself reads
//! or writes.

mod bag;
pub mod keys;

pub use bag::{StateBag, StateKey, StateValue};
