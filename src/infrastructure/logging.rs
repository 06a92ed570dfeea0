//! Logging initialization
//!
//! Console logging through `tracing-subscriber` with an `EnvFilter`
//! (overridable via `RUST_LOG`), plus optional non-blocking file output
//! next to the executable. The non-blocking writer guards must outlive
//! the subscriber, so they are parked in a process-wide vec.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use super::config::LoggingConfig;

lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Log directory relative to the executable location.
#[must_use]
pub fn log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    exe_dir.join("logs")
}

/// Initializes the logging system. Safe to call once per process.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let console_layer = config
        .console_output
        .then(|| fmt::layer().with_target(true).boxed());

    let file_layer = if config.file_output {
        let dir = log_directory();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::never(dir, "portal-order-export.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        if let Ok(mut guards) = LOG_GUARDS.lock() {
            guards.push(guard);
        }
        Some(fmt::layer().with_writer(writer).with_ansi(false).boxed())
    } else {
        None
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("logging already initialized")?;

    Ok(())
}
