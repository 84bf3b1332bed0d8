//! Configuration System using Figment
//!
//! Configuration is loaded from (in order of precedence):
//! 1. Environment variables prefixed with `PXI_DAQ_` (nested keys separated by `__`)
//! 2. TOML configuration file (default: `config/pxi_daq.toml`)
//! 3. Built-in defaults
//!
//! # Example
//!
//! ```no_run
//! use pxi_daq::config::PxiConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PxiConfig::load()?;
//!     println!("Log level: {}", config.application.log_level);
//!     println!("Card width: {}", config.waveform.card_width);
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! ```text
//! PXI_DAQ_APPLICATION__LOG_LEVEL=debug
//! PXI_DAQ_SESSION__RESOURCE=/dev/ttyUSB0
//! PXI_DAQ_WAVEFORM__LAYOUT=group_by_channel
//! ```

use crate::codec::{DataLayout, PACKED_WORD_BITS};
use crate::error::{AppResult, DaqError};
use crate::waveform::Waveform;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/pxi_daq.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "PXI_DAQ_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file or environment could not be read or deserialized.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] Box<figment::Error>),
    /// A loaded value is out of range.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
    /// The configuration could not be rendered as TOML.
    #[error("Configuration serialization error: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PxiConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Waveform encoding settings
    pub waveform: WaveformConfig,
    /// Hardware session settings
    pub session: SessionConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable output
    pub json_logs: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "pxi_daq".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Waveform encoding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Digital channels per waveform; waveforms of any other width are refused
    pub channel_width: usize,
    /// Channels driven by a single HSDIO card
    pub card_width: usize,
    /// Sample ordering of decompressed output
    pub layout: DataLayout,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            channel_width: PACKED_WORD_BITS,
            card_width: PACKED_WORD_BITS,
            layout: DataLayout::GroupBySample,
        }
    }
}

/// Hardware session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Driver resource name (e.g. "PXI1Slot2", "img0", "/dev/ttyUSB0")
    pub resource: String,
    /// Baud rate for serial transports
    pub baud_rate: u32,
    /// Per-operation timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resource: "PXI1Slot2".to_string(),
            baud_rate: 9600,
            timeout_ms: 10_000,
        }
    }
}

impl WaveformConfig {
    /// Check that `waveform` has the configured channel count.
    ///
    /// # Errors
    /// - `ShapeMismatch` if `waveform.width()` differs from `channel_width`
    pub fn check_width(&self, waveform: &Waveform) -> AppResult<()> {
        if waveform.width() != self.channel_width {
            return Err(DaqError::ShapeMismatch(format!(
                "waveform '{}' has {} channels, configured channel_width is {}",
                waveform.name(),
                waveform.width(),
                self.channel_width
            )));
        }
        Ok(())
    }
}

impl SessionConfig {
    /// Per-operation timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PxiConfig {
    /// Load configuration from the default file and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file is malformed or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(PxiConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Channel and card widths are non-zero
    /// - Session timeout is non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.waveform.channel_width == 0 {
            return Err(ConfigError::ValidationError(
                "waveform.channel_width must be at least 1".to_string(),
            ));
        }

        if self.waveform.card_width == 0 {
            return Err(ConfigError::ValidationError(
                "waveform.card_width must be at least 1".to_string(),
            ));
        }

        if self.session.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "session.timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PxiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.waveform.channel_width, 32);
        assert_eq!(config.session.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_check_width() {
        let config = WaveformConfig {
            channel_width: 2,
            ..Default::default()
        };
        let two = Waveform::new("two", 2, vec![vec![1, 0]], vec![1]);
        let three = Waveform::new("three", 3, vec![vec![1, 0, 1]], vec![1]);
        assert!(config.check_width(&two).is_ok());
        let err = config.check_width(&three).unwrap_err();
        assert!(err.is_shape_mismatch());
        assert!(err.to_string().contains("channel_width is 2"));
    }

    #[test]
    fn test_load_from_file() {
        figment::Jail::expect_with(|_jail| {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(
                file,
                r#"
[application]
log_level = "debug"

[waveform]
card_width = 16
layout = "group_by_channel"

[session]
resource = "/dev/ttyUSB0"
timeout_ms = 500
"#
            )
            .unwrap();

            let config = PxiConfig::load_from(file.path()).unwrap();
            assert_eq!(config.application.log_level, "debug");
            assert_eq!(config.application.name, "pxi_daq");
            assert_eq!(config.waveform.card_width, 16);
            assert_eq!(config.waveform.layout, DataLayout::GroupByChannel);
            assert_eq!(config.session.resource, "/dev/ttyUSB0");
            assert_eq!(config.session.timeout(), Duration::from_millis(500));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = PxiConfig::load_from("does/not/exist.toml").unwrap();
            assert_eq!(config, PxiConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("pxi.toml", "[session]\nbaud_rate = 19200\n")?;
            jail.set_env("PXI_DAQ_SESSION__BAUD_RATE", "115200");
            jail.set_env("PXI_DAQ_APPLICATION__LOG_LEVEL", "trace");

            let config = PxiConfig::load_from("pxi.toml").unwrap();
            assert_eq!(config.session.baud_rate, 115200);
            assert_eq!(config.application.log_level, "trace");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = PxiConfig::default();
        config.application.log_level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log_level 'verbose'"));
    }

    #[test]
    fn test_zero_card_width_rejected() {
        let mut config = PxiConfig::default();
        config.waveform.card_width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PxiConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[waveform]"));
        let parsed: PxiConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
