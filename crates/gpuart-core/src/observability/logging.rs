//! Structured Logging
//!
//! Installs a `tracing` subscriber for the runtime.
//!
//! # Features
//!
//! - Plain or JSON structured output
//! - Per-target log levels (e.g. verbose host layers, quiet facade)
//! - `RUST_LOG` takes precedence when set
//!
//! # Example
//!
//! ```rust,ignore
//! use gpuart_core::observability::logging::{LogConfig, LogLevel};
//!
//! LogConfig::production()
//!     .with_target_level("gpuart_core::host", LogLevel::Trace)
//!     .init()?;
//! ```

use crate::runtime::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    #[default]
    Info,
    /// Warning level
    Warn,
    /// Error level
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level
    pub level: LogLevel,
    /// Enable structured JSON output
    pub structured: bool,
    /// Include caller location
    pub include_location: bool,
    /// Include thread names (the persistent thread is named)
    pub include_thread_names: bool,
    /// Per-target log levels
    pub target_levels: BTreeMap<String, LogLevel>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            structured: false,
            include_location: false,
            include_thread_names: true,
            target_levels: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    /// Development configuration
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            include_location: true,
            ..Default::default()
        }
    }

    /// Production configuration
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            structured: true,
            ..Default::default()
        }
    }

    /// Derive logging settings from a runtime configuration.
    ///
    /// An unparseable level falls back to `info`.
    pub fn from_runtime(config: &RuntimeConfig) -> Self {
        Self {
            level: config.log_level.parse().unwrap_or_default(),
            structured: config.structured_logging,
            ..Default::default()
        }
    }

    /// Set log level for a specific target
    pub fn with_target_level(mut self, target: impl Into<String>, level: LogLevel) -> Self {
        self.target_levels.insert(target.into(), level);
        self
    }

    /// Filter directives, e.g. `info,gpuart_core::host=trace`
    pub fn directives(&self) -> String {
        let mut directives = self.level.to_string();
        for (target, level) in &self.target_levels {
            directives.push_str(&format!(",{}={}", target, level));
        }
        directives
    }

    /// Initialize logging
    ///
    /// A subscriber that is already installed is left in place.
    pub fn init(&self) -> crate::error::Result<()> {
        use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.directives())
                .map_err(|e| crate::error::GpuartError::ConfigError(e.to_string()))?,
        };

        let subscriber = tracing_subscriber::registry().with(filter);

        if self.structured {
            let layer = fmt::layer()
                .json()
                .with_thread_names(self.include_thread_names)
                .with_file(self.include_location)
                .with_line_number(self.include_location);

            subscriber.with(layer).try_init().ok();
        } else {
            let layer = fmt::layer()
                .with_thread_names(self.include_thread_names)
                .with_file(self.include_location)
                .with_line_number(self.include_location);

            subscriber.with(layer).try_init().ok();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_config() {
        let config = LogConfig::production();
        assert!(config.structured);
        assert_eq!(config.level, LogLevel::Info);

        let dev_config = LogConfig::development();
        assert!(!dev_config.structured);
        assert_eq!(dev_config.level, LogLevel::Debug);
    }

    #[test]
    fn test_from_runtime_config() {
        let config = LogConfig::from_runtime(&RuntimeConfig::production());
        assert!(config.structured);
        assert_eq!(config.level, LogLevel::Info);

        let runtime = RuntimeConfig {
            log_level: "loud".to_string(),
            ..RuntimeConfig::testing()
        };
        assert_eq!(LogConfig::from_runtime(&runtime).level, LogLevel::Info);
    }

    #[test]
    fn test_directives() {
        let config = LogConfig::default()
            .with_target_level("gpuart_core::host", LogLevel::Trace)
            .with_target_level("gpuart_core::runtime", LogLevel::Warn);
        assert_eq!(
            config.directives(),
            "info,gpuart_core::host=trace,gpuart_core::runtime=warn"
        );
    }
}
