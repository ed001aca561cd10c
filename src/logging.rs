//! Logging for Ampere
//!
//! Output goes to a daily-rotated file, and optionally the console, through
//! the tracing ecosystem. Components log via a small scoped facade that
//! attaches the component name, and the charge point id where one is in
//! play, as structured fields on every line.

use crate::config::LoggingConfig;
use crate::error::{AmpereError, Result};
use once_cell::sync::OnceCell;
use tracing::{Level, debug, error, info, warn};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// Keeps the non-blocking writer alive for the process lifetime; dropping it
// would stop the background flush thread.
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Wire the subscriber stack: env filter, rotated file output, optional
/// console mirror. Single-shot; a second call returns an error.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    // The level is checked before anything touches the filesystem
    let level: Level = config
        .level
        .parse()
        .map_err(|_| AmpereError::config(format!("unknown log level {:?}", config.level)))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ampere={},tower_http=warn", level).into());

    let file_appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix("ampere")
        .filename_suffix("log")
        .max_log_files(config.backup_count as usize)
        .build(&config.file)
        .map_err(|e| AmpereError::logging(format!("cannot log under {}: {}", config.file, e)))?;

    let (writer, guard) = non_blocking(file_appender);
    LOG_GUARD.set(guard).ok();

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_ansi(false);
    let file_layer = if config.json_format {
        file_layer.json().boxed()
    } else {
        file_layer.boxed()
    };

    // Console output mirrors the file; useful in containers, noise on boxes
    // where journald already tails the file.
    let console_layer = config
        .console_output
        .then(|| fmt::layer().with_target(false).boxed());

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| AmpereError::logging(e.to_string()))?;

    info!(%level, directory = %config.file, "logging initialized");
    Ok(())
}

/// Component-scoped logger
///
/// Cheap to clone and to construct on the fly; holds no handle to the
/// subscriber, so it is safe to use before `init_logging` (lines are
/// dropped) and from any task.
#[derive(Clone)]
pub struct ScopedLog {
    component: &'static str,
    station: Option<String>,
}

impl ScopedLog {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            station: None,
        }
    }

    /// Scope to one charge point; its id lands on every line
    pub fn for_station(component: &'static str, station: impl Into<String>) -> Self {
        Self {
            component,
            station: Some(station.into()),
        }
    }

    pub fn info(&self, message: &str) {
        match &self.station {
            Some(station) => info!(component = self.component, %station, "{}", message),
            None => info!(component = self.component, "{}", message),
        }
    }

    pub fn warn(&self, message: &str) {
        match &self.station {
            Some(station) => warn!(component = self.component, %station, "{}", message),
            None => warn!(component = self.component, "{}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match &self.station {
            Some(station) => error!(component = self.component, %station, "{}", message),
            None => error!(component = self.component, "{}", message),
        }
    }

    pub fn debug(&self, message: &str) {
        match &self.station {
            Some(station) => debug!(component = self.component, %station, "{}", message),
            None => debug!(component = self.component, "{}", message),
        }
    }
}
