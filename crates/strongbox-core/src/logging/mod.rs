//! Subscriber setup for the engine's `tracing` events
//!
//! The engine only emits events; embedding programs decide where they go.
//! Two ready-made setups are provided:
//!
//! - [`init`]: human-readable output on stderr, filtered by `STRONGBOX_LOG`
//! - [`init_file`]: a debug log file in the temp dir, useful when stderr is
//!   not visible. Only active when `STRONGBOX_DEBUG` is set.
//!
//! Both are safe to call more than once; only the first installed
//! subscriber wins.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `strongbox_core=debug`
pub const LOG_ENV: &str = "STRONGBOX_LOG";

/// Enables the debug log file when set to `1` or `true`
pub const DEBUG_ENV: &str = "STRONGBOX_DEBUG";

const LOG_FILE: &str = "strongbox-debug.log";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Location of the debug log file
pub fn log_file_path() -> PathBuf {
    std::env::temp_dir().join(LOG_FILE)
}

/// Log to stderr; defaults to `warn` when `STRONGBOX_LOG` is unset
///
/// Returns false if a global subscriber was already installed.
pub fn init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter("warn"))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Append to [`log_file_path`] if `STRONGBOX_DEBUG` is set
///
/// Returns the log file path when file logging was installed.
pub fn init_file() -> std::io::Result<Option<PathBuf>> {
    if !debug_enabled() {
        return Ok(None);
    }
    let path = log_file_path();
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .is_ok();
    Ok(installed.then_some(path))
}
