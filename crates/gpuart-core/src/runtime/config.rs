//! Runtime Configuration
//!
//! Configuration types for the GPUart runtime, supporting:
//! - Programmatic configuration via builders
//! - Environment variable overrides
//! - File-based configuration (TOML/JSON)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default length of the persistent thread's event queue
pub const DEFAULT_EVENT_QUEUE_LENGTH: usize = 10;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Allow `start` again after `stop`
    pub allow_restart: bool,
    /// Name of the persistent execution thread
    pub worker_name: String,
    /// Capacity of the persistent thread's event queue
    pub event_queue_length: usize,
    /// Upper bound on the persistent thread start handshake
    #[serde(with = "duration_millis")]
    pub start_timeout: Duration,
    /// Period between scheduling triggers when driven by the CLI
    #[serde(with = "duration_millis")]
    pub schedule_period: Duration,
    /// Enable structured JSON logging
    pub structured_logging: bool,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl RuntimeConfig {
    /// Development configuration - restartable, verbose logging
    pub fn development() -> Self {
        Self {
            allow_restart: true,
            worker_name: "gpuart-persistent".to_string(),
            event_queue_length: DEFAULT_EVENT_QUEUE_LENGTH,
            start_timeout: Duration::from_secs(5),
            schedule_period: Duration::from_millis(10),
            structured_logging: false,
            log_level: "debug".to_string(),
        }
    }

    /// Production configuration - single session, structured logging
    pub fn production() -> Self {
        Self {
            allow_restart: false,
            worker_name: "gpuart-persistent".to_string(),
            event_queue_length: 64,
            start_timeout: Duration::from_secs(1),
            schedule_period: Duration::from_millis(1),
            structured_logging: true,
            log_level: "info".to_string(),
        }
    }

    /// Testing configuration - deterministic, short timeouts
    pub fn testing() -> Self {
        Self {
            allow_restart: true,
            worker_name: "gpuart-test".to_string(),
            event_queue_length: 4,
            start_timeout: Duration::from_millis(500),
            schedule_period: Duration::from_millis(1),
            structured_logging: false,
            log_level: "trace".to_string(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GPUART_ALLOW_RESTART") {
            config.allow_restart = val.parse().unwrap_or(config.allow_restart);
        }
        if let Ok(val) = std::env::var("GPUART_WORKER_NAME") {
            config.worker_name = val;
        }
        if let Ok(val) = std::env::var("GPUART_EVENT_QUEUE_LENGTH") {
            config.event_queue_length = val.parse().unwrap_or(config.event_queue_length);
        }
        if let Ok(val) = std::env::var("GPUART_START_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                config.start_timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(val) = std::env::var("GPUART_SCHEDULE_PERIOD_MS") {
            if let Ok(ms) = val.parse() {
                config.schedule_period = Duration::from_millis(ms);
            }
        }
        if let Ok(val) = std::env::var("GPUART_LOG_LEVEL") {
            config.log_level = val;
        }
        if let Ok(val) = std::env::var("GPUART_STRUCTURED_LOGGING") {
            config.structured_logging = val.parse().unwrap_or(config.structured_logging);
        }

        config
    }

    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        let config: Self = match ext {
            "json" => serde_json::from_str(&contents)?,
            "toml" => toml::from_str(&contents)?,
            _ => return Err(ConfigError::UnsupportedFormat(ext.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSerError)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::JsonError)
    }

    /// Create a builder for this configuration
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_queue_length == 0 {
            return Err(ConfigError::InvalidValue(
                "event_queue_length must be > 0".to_string(),
            ));
        }
        if self.start_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "start_timeout must be > 0".to_string(),
            ));
        }
        if self.schedule_period.is_zero() {
            return Err(ConfigError::InvalidValue(
                "schedule_period must be > 0".to_string(),
            ));
        }
        if self.worker_name.trim().is_empty() {
            return Err(ConfigError::MissingField("worker_name".to_string()));
        }
        Ok(())
    }
}

/// Builder for RuntimeConfig
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Create builder with production defaults
    pub fn production() -> Self {
        Self {
            config: RuntimeConfig::production(),
        }
    }

    /// Allow or forbid restart after stop
    pub fn allow_restart(mut self, allowed: bool) -> Self {
        self.config.allow_restart = allowed;
        self
    }

    /// Set persistent thread name
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_name = name.into();
        self
    }

    /// Set event queue length
    pub fn event_queue_length(mut self, length: usize) -> Self {
        self.config.event_queue_length = length;
        self
    }

    /// Set start handshake timeout
    pub fn start_timeout(mut self, timeout: Duration) -> Self {
        self.config.start_timeout = timeout;
        self
    }

    /// Set scheduling period
    pub fn schedule_period(mut self, period: Duration) -> Self {
        self.config.schedule_period = period;
        self
    }

    /// Enable structured logging
    pub fn structured_logging(mut self, enabled: bool) -> Self {
        self.config.structured_logging = enabled;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialize error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// Unsupported config format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Invalid configuration value
    #[error("Invalid config value: {0}")]
    InvalidValue(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert!(config.allow_restart);
        assert_eq!(config.event_queue_length, DEFAULT_EVENT_QUEUE_LENGTH);
    }

    #[test]
    fn test_production_config() {
        let config = RuntimeConfig::production();
        assert!(!config.allow_restart);
        assert!(config.structured_logging);
    }

    #[test]
    fn test_config_validation() {
        let config = RuntimeConfig {
            event_queue_length: 0,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RuntimeConfig {
            start_timeout: Duration::ZERO,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RuntimeConfig {
            worker_name: "  ".to_string(),
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(_))
        ));

        assert!(RuntimeConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RuntimeConfigBuilder::production()
            .allow_restart(true)
            .event_queue_length(32)
            .build()
            .unwrap();

        assert!(config.allow_restart);
        assert_eq!(config.event_queue_length, 32);

        assert!(RuntimeConfig::builder().event_queue_length(0).build().is_err());
    }

    #[test]
    fn test_toml_file_partial_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "allow_restart = false\nstart_timeout = 250").unwrap();

        let config = RuntimeConfig::from_file(file.path()).unwrap();
        assert!(!config.allow_restart);
        assert_eq!(config.start_timeout, Duration::from_millis(250));
        assert_eq!(config.worker_name, RuntimeConfig::default().worker_name);
    }

    #[test]
    fn test_json_file_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"event_queue_length": 0}}"#).unwrap();

        let err = RuntimeConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = RuntimeConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "yaml"));
    }

    #[test]
    fn test_toml_output_parses_back() {
        let config = RuntimeConfig::production();
        let text = config.to_toml().unwrap();
        let parsed: RuntimeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
