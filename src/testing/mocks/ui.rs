//! Mock UI for testing

use crate::ui::Ui;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// [`Ui`] that records every call and answers prompts from a queue.
///
/// Messages are kept with a kind prefix: `ASK: `, `SAY: `, `MESSAGE: ` or
/// `ERROR: `.
#[derive(Debug, Default)]
pub struct MockUi {
    messages: Mutex<Vec<String>>,
    answers: Mutex<VecDeque<String>>,
}

impl MockUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer successive `ask` calls with `answers`, in order
    pub fn with_answers(answers: Vec<String>) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            answers: Mutex::new(answers.into()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Messages passed to [`Ui::error`], without the prefix
    pub fn errors(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| m.strip_prefix("ERROR: ").map(str::to_string))
            .collect()
    }

    fn record(&self, kind: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("{kind}: {message}"));
    }
}

#[async_trait]
impl Ui for MockUi {
    async fn ask(&self, query: &str) -> Result<String> {
        self.record("ASK", query);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no mock answer configured"))
    }

    fn say(&self, message: &str) {
        self.record("SAY", message);
    }

    fn message(&self, message: &str) {
        self.record("MESSAGE", message);
    }

    fn error(&self, message: &str) {
        self.record("ERROR", message);
    }
}
