//! Interrupt handling
//!
//! Turns SIGINT and SIGTERM into a [`Runner::cancel`] so an interrupted
//! build still cleans up what it created.

use crate::runner::Runner;
use anyhow::{Context, Result};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use signal_hook::iterator::{Handle as SignalHandle, Signals};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::runtime::Handle;
use tracing::{info, warn};

const INTERRUPTS: [i32; 2] = [SIGINT, SIGTERM];

/// Stops cancelling the runner when dropped.
///
/// signal-hook cannot put the original dispositions back, so the handlers
/// stay registered for the life of the process. After the drop they run the
/// default action instead, and SIGINT or SIGTERM terminates the process again.
pub struct InterruptGuard {
    signals: SignalHandle,
    released: Arc<AtomicBool>,
}

impl InterruptGuard {
    /// Whether signals have gone back to their default action
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
        self.signals.close();
    }
}

/// Cancel `runner` whenever the process receives SIGINT or SIGTERM.
///
/// Must be called from within a tokio runtime; the cancellation is spawned
/// onto it.
pub fn cancel_on_interrupt(runner: Arc<Runner>) -> Result<InterruptGuard> {
    let runtime = Handle::try_current().context("Interrupt handling requires a tokio runtime")?;
    let released = Arc::new(AtomicBool::new(false));
    for sig in INTERRUPTS {
        flag::register_conditional_default(sig, released.clone())
            .context("Failed to install interrupt handlers")?;
    }
    let mut signals = Signals::new(INTERRUPTS).context("Failed to install interrupt handlers")?;
    let handle = signals.handle();

    thread::Builder::new()
        .name("multistep-signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                let name = if sig == SIGINT { "SIGINT" } else { "SIGTERM" };
                info!("Received {}, cancelling build", name);

                let runner = runner.clone();
                runtime.spawn(async move { runner.cancel().await });
            }
        })
        .context("Failed to spawn signal thread")?;

    Ok(InterruptGuard {
        signals: handle,
        released,
    })
}

/// Log and swallow a failure to install handlers, for callers that can run
/// without them
pub fn try_cancel_on_interrupt(runner: Arc<Runner>) -> Option<InterruptGuard> {
    match cancel_on_interrupt(runner) {
        Ok(guard) => Some(guard),
        Err(e) => {
            warn!("Interrupts will not cancel the build: {:#}", e);
            None
        }
    }
}
