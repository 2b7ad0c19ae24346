//! Logging Configuration and Initialization
//!
//! Centralised tracing setup for taxtally binaries. Supports:
//!
//! - Console output (always stderr, stdout is reserved for results), a
//!   daily rolling log file, or both
//! - Text or JSON formatting
//! - Level and per-module filter directives
//! - Overrides from `TAXTALLY_LOG_*` environment variables
//!
//! Use the structured `tracing` macros with fields rather than formatted
//! strings:
//!
//! ```rust
//! use tracing::{debug, warn};
//!
//! let observation_id = "12345";
//! let wait_ms = 250;
//! debug!(wait_ms, "Rate limiting before next request");
//! warn!(%observation_id, "Observation failed, queued for retry");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use taxtally_common::logging::{init_logging, LogConfig, LogLevel};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::builder().level(LogLevel::Debug).build();
//!     let config = config.merge_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("Application started");
//!     Ok(())
//! }
//! ```

use crate::error::TaxtallyError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = TaxtallyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(TaxtallyError::config(format!("invalid log level '{}'", s))),
        }
    }
}

/// Output target for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    fn wants_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn wants_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl std::str::FromStr for LogOutput {
    type Err = TaxtallyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stderr" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(TaxtallyError::config(format!("invalid log output '{}'", s))),
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = TaxtallyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(TaxtallyError::config(format!("invalid log format '{}'", s))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,

    /// Output target (console, file, or both)
    pub output: LogOutput,

    /// Log format (text or JSON)
    pub format: LogFormat,

    /// Directory for log files (only used when output includes file)
    pub log_dir: PathBuf,

    /// Log file name prefix, e.g. "taxtally" -> "taxtally.2025-03-17"
    pub log_file_prefix: String,

    /// Additional filter directives, e.g. "reqwest=warn,hyper=info"
    pub filter_directives: Option<String>,

    /// Whether to include target module names in logs
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "taxtally".to_string(),
            filter_directives: None,
            include_targets: false,
        }
    }
}

impl LogConfig {
    /// Create a builder for fluent configuration
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// Apply overrides from environment variables on top of `self`.
    ///
    /// - `TAXTALLY_LOG_LEVEL`: trace, debug, info, warn, error
    /// - `TAXTALLY_LOG_OUTPUT`: console, file, both
    /// - `TAXTALLY_LOG_FORMAT`: text, json
    /// - `TAXTALLY_LOG_DIR`: directory for log files
    /// - `TAXTALLY_LOG_FILTER`: additional filter directives
    pub fn merge_env(mut self) -> crate::Result<Self> {
        if let Ok(level) = std::env::var("TAXTALLY_LOG_LEVEL") {
            self.level = level.parse()?;
        }

        if let Ok(output) = std::env::var("TAXTALLY_LOG_OUTPUT") {
            self.output = output.parse()?;
        }

        if let Ok(format) = std::env::var("TAXTALLY_LOG_FORMAT") {
            self.format = format.parse()?;
        }

        if let Ok(dir) = std::env::var("TAXTALLY_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }

        if let Ok(filter) = std::env::var("TAXTALLY_LOG_FILTER") {
            self.filter_directives = Some(filter);
        }

        Ok(self)
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::from_default_env().add_directive(self.level.to_tracing_level().into());

        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                filter = filter.add_directive(
                    directive
                        .trim()
                        .parse()
                        .with_context(|| format!("Failed to parse filter directive '{}'", directive))?,
                );
            }
        }

        Ok(filter)
    }
}

/// Builder for LogConfig
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn include_targets(mut self, include: bool) -> Self {
        self.config.include_targets = include;
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global tracing subscriber.
///
/// Call once at startup. When file output is enabled the returned guard
/// flushes the background writer on drop and must be held until exit.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = config.env_filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.output.wants_console() {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_targets);
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    if config.output.wants_file() {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("Failed to create log directory {}", config.log_dir.display())
        })?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_target(config.include_targets)
            .with_ansi(false);
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
