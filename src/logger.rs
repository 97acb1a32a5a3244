//! # Logging bootstrap.
//!
//! Installs a global `tracing` subscriber: an [`EnvFilter`] built from
//! [`LoggerConfig::level`] plus a text or JSON `fmt` layer.
//!
//! ```no_run
//! use allocvisor::{logger_init, LoggerConfig, LoggerFormat};
//!
//! let cfg = LoggerConfig {
//!     format: LoggerFormat::Json,
//!     level: "allocvisor=debug,info".into(),
//!     ..LoggerConfig::default()
//! };
//! logger_init(&cfg).expect("logger");
//! ```

use std::io::IsTerminal;
use std::str::FromStr;

use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggerFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LoggerFormat::Text),
            "json" => Ok(LoggerFormat::Json),
            _ => Err(LoggerError::InvalidFormat(s.to_string())),
        }
    }
}

/// Logger settings.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Output format.
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `allocvisor=debug,warn`.
    pub level: String,
    /// Include the event target in each line.
    pub with_targets: bool,
    /// ANSI colors (text format only).
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
        }
    }
}

/// Logger initialisation failures.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// Unknown format name.
    #[error("invalid logger format: {0} (expected: text|json)")]
    InvalidFormat(String),
    /// The level directive did not parse.
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
    /// A global subscriber is already installed.
    #[error("logger has been already initialized")]
    AlreadyInitialized,
    /// Any other failure.
    #[error("failed to initialize logger: {0}")]
    InitializationFailed(String),
}

impl LoggerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoggerError::InvalidFormat(_) => "logger_invalid_format",
            LoggerError::InvalidLogLevel(_) => "logger_invalid_level",
            LoggerError::AlreadyInitialized => "logger_already_initialized",
            LoggerError::InitializationFailed(_) => "logger_init_failed",
        }
    }
}

/// Installs the global subscriber described by `cfg`.
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = mk_filter(&cfg.level)?;
    match cfg.format {
        LoggerFormat::Text => {
            let layer = fmt::layer()
                .with_ansi(cfg.use_color)
                .with_target(cfg.with_targets);
            init_with(tracing_subscriber::registry().with(filter).with(layer))
        }
        LoggerFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(cfg.with_targets);
            init_with(tracing_subscriber::registry().with(filter).with(layer))
        }
    }
}

fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

fn init_with<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(|e| {
        let s = e.to_string();
        if s.contains("already") {
            LoggerError::AlreadyInitialized
        } else {
            LoggerError::InitializationFailed(s)
        }
    })
}
