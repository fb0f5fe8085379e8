//! Logging setup
//!
//! Log lines go to stderr so that stdout stays clean for command output
//! (reports, shell results, downloaded JSON). Verbosity comes from
//! `LOG_LEVEL` (`DEBUG`, `INFO` or `ERROR`); `--debug` forces debug output.

use crate::config::LogLevel;
use tracing_subscriber::EnvFilter;

/// Resolve the filter directive for the given flags
pub fn filter_directive(debug: bool) -> &'static str {
    if debug {
        LogLevel::Debug.as_filter()
    } else {
        LogLevel::from_env().as_filter()
    }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(debug: bool) {
    let filter = EnvFilter::new(filter_directive(debug));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(debug)
        .try_init();
}
