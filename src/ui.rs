//! User-facing output for steps
//!
//! Steps report progress and failures through a [`Ui`] they find in the
//! state bag under [`crate::state::keys::UI`]. The runner never writes to it
//! except through the optional debug pause.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Sink for user-visible messages
#[async_trait]
pub trait Ui: Send + Sync {
    /// Ask the user a question and return the trimmed answer
    async fn ask(&self, query: &str) -> Result<String>;

    /// Announce a new phase of work
    fn say(&self, message: &str);

    /// Report detail within the current phase
    fn message(&self, message: &str);

    /// Report an error
    fn error(&self, message: &str);
}

/// [`Ui`] that writes to the terminal
pub struct ConsoleUi {
    prefix: String,
}

impl Default for ConsoleUi {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
        }
    }

    /// Prefix every line, typically with the build name
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn format(&self, marker: &str, message: &str) -> String {
        if self.prefix.is_empty() {
            format!("{marker} {message}")
        } else {
            format!("{marker} {}: {message}", self.prefix)
        }
    }
}

#[async_trait]
impl Ui for ConsoleUi {
    async fn ask(&self, query: &str) -> Result<String> {
        println!("{}", self.format("==>", query));

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("Failed to read answer from stdin")?;
        Ok(line.trim().to_string())
    }

    fn say(&self, message: &str) {
        println!("{}", self.format("==>", message));
    }

    fn message(&self, message: &str) {
        println!("{}", self.format("   ", message));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", self.format("==> ERROR", message));
    }
}
