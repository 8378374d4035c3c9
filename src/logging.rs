//! Logging setup
//!
//! The wall owns the terminal, so while the TUI runs logs go to a file next
//! to the caches. Headless subcommands log to stderr. The level is taken from
//! `PRODUCTWALL_LOG` (an `EnvFilter` directive), defaulting to `info`.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "PRODUCTWALL_LOG";

/// Name of the log file written while the TUI runs
pub const LOG_FILE: &str = "productwall.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Sends logs to `<dir>/productwall.log`, returning the file path
///
/// Logging is best effort: if the file can't be opened nothing is installed.
/// Calling this when a subscriber is already set is a no-op.
pub fn init_file(dir: &Path) -> Option<PathBuf> {
    fs::create_dir_all(dir).ok()?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .ok()?;
    Some(path)
}

/// Sends logs to stderr
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
