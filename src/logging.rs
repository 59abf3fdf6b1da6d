//! Tracing subscriber setup

use tracing::debug;

/// Filter directive for a verbosity level
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install a global fmt subscriber for `verbose`.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging(verbose: u8) {
    init_logging_with_filter(log_filter(verbose), verbose);
}

/// Install a global fmt subscriber with an explicit filter directive
pub fn init_logging_with_filter(filter: &str, verbose: u8) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 3)
        .with_line_number(verbose >= 3)
        .try_init()
        .is_ok();

    if installed {
        debug!("Logging initialized with filter {filter:?}");
    }
}
