//! Runner configuration.
//!
//! Loaded from YAML; every field has a default so partial files work.
//!
//! ```yaml
//! serial:
//!   port: /dev/ttyACM0
//!   baud_rate: 57600
//! session:
//!   io_timeout_ms: 2000
//!   init_device: true
//! discover: true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default blocking I/O timeout, which also bounds shutdown latency.
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 2000;
/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 57600;

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid YAML for [`RunnerConfig`].
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port path or name (e.g. `/dev/ttyACM0`, `COM3`).
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Device session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Read timeout and queue poll interval, in milliseconds.
    pub io_timeout_ms: u64,
    /// Queue GAP_DeviceInit when the session starts.
    pub init_device: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            init_device: true,
        }
    }
}

impl SessionConfig {
    /// The I/O timeout as a duration.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Top-level configuration for the `stalker` binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Serial port settings.
    pub serial: SerialConfig,
    /// Session settings.
    pub session: SessionConfig,
    /// Send a discovery request after start.
    pub discover: bool,
}

impl RunnerConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RunnerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.io_timeout_ms == 0 {
            return Err(ConfigError::Invalid("io_timeout_ms must be positive".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be positive".to_string()));
        }
        Ok(())
    }
}
