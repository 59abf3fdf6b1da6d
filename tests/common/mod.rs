//! Common test utilities: a fake cloud and steps that create resources in it

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use multistep::{halt, report_cleanup_failure, keys, StateBag, Step, StepAction, Ui};
use multistep::testing::MockUi;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// In-memory resource provider shared by the steps of one test
#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    live: Arc<Mutex<BTreeSet<String>>>,
    undeletable: Arc<Mutex<BTreeSet<String>>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, id: &str) -> Result<()> {
        if !self.live.lock().unwrap().insert(id.to_string()) {
            return Err(anyhow!("{id} already exists"));
        }
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        if self.undeletable.lock().unwrap().contains(id) {
            return Err(anyhow!("{id} is in use"));
        }
        if !self.live.lock().unwrap().remove(id) {
            return Err(anyhow!("{id} not found"));
        }
        Ok(())
    }

    /// Make deleting `id` fail
    pub fn pin(&self, id: &str) {
        self.undeletable.lock().unwrap().insert(id.to_string());
    }

    pub fn live(&self) -> Vec<String> {
        self.live.lock().unwrap().iter().cloned().collect()
    }
}

/// Creates one resource and records its id under `key`
pub struct StepCreateResource {
    cloud: FakeCloud,
    id: String,
    key: String,
}

impl StepCreateResource {
    pub fn new(cloud: &FakeCloud, id: &str) -> Self {
        Self {
            cloud: cloud.clone(),
            id: id.to_string(),
            key: format!("{id}_id"),
        }
    }
}

#[async_trait]
impl Step for StepCreateResource {
    fn name(&self) -> &str {
        &self.id
    }

    async fn run(&mut self, state: &StateBag) -> StepAction {
        if let Some(ui) = keys::UI.get_ok(state) {
            ui.say(&format!("Creating {}...", self.id));
        }
        if let Err(e) = self.cloud.create(&self.id) {
            return halt(state, e.context(format!("Error creating {}", self.id)));
        }
        state.put(self.key.clone(), self.id.clone());
        StepAction::Continue
    }

    async fn cleanup(&mut self, state: &StateBag) {
        let Some(id) = state.get_ok::<String>(&self.key) else {
            return;
        };
        if let Err(e) = self.cloud.delete(&id) {
            report_cleanup_failure(state, &self.id, &id, &e);
        }
    }
}

/// Fails with `message` without creating anything
pub struct StepFail {
    message: String,
}

impl StepFail {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Step for StepFail {
    async fn run(&mut self, state: &StateBag) -> StepAction {
        halt(state, anyhow!("{}", self.message))
    }

    async fn cleanup(&mut self, _state: &StateBag) {}
}

/// State bag with a [`MockUi`] installed under [`keys::UI`]
pub fn state_with_ui() -> (StateBag, Arc<MockUi>) {
    let state = StateBag::new();
    let ui = Arc::new(MockUi::new());
    keys::UI.put(&state, ui.clone() as Arc<dyn Ui>);
    (state, ui)
}
