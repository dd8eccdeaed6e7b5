#![forbid(unsafe_code)]

//! Logging and tracing support.
//!
//! Re-exports the `tracing` macros used across the workspace and installs a
//! file-backed subscriber. While a dashboard is live, stdout belongs to the
//! presenter and stderr shares the same terminal, so log output only ever
//! goes to a file.

use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

use crate::config::LogConfig;

/// Install the global subscriber described by `config`.
///
/// Returns `Ok(false)` when no log file is configured or a global subscriber
/// is already installed (tests install their own).
pub fn init_logging(config: &LogConfig) -> io::Result<bool> {
    let Some(path) = config.file.as_ref() else {
        return Ok(false);
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .is_ok();
    Ok(installed)
}
