//! Tracing initialisation.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! `application.log_level`. Library code only emits events; the binary calls
//! [`init_from_config`] once at startup.

use crate::config::ApplicationConfig;
use crate::error::{AppResult, DaqError};
use tracing_subscriber::EnvFilter;

/// Build the event filter for the given configuration.
pub fn filter_for(config: &ApplicationConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Install the global tracing subscriber.
///
/// # Errors
/// Returns `DaqError::Logging` if a global subscriber is already installed.
pub fn init_from_config(config: &ApplicationConfig) -> AppResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_for(config))
        .with_target(true);

    if config.json_logs {
        builder
            .json()
            .try_init()
            .map_err(|e| DaqError::Logging(format!("JSON subscriber: {}", e)))
    } else {
        builder
            .try_init()
            .map_err(|e| DaqError::Logging(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_uses_configured_level() {
        let config = ApplicationConfig {
            log_level: "debug".to_string(),
            ..Default::default()
        };
        if std::env::var("RUST_LOG").is_err() {
            assert_eq!(filter_for(&config).to_string(), "debug");
        }
    }

    #[test]
    fn test_second_init_is_logging_error() {
        let config = ApplicationConfig::default();
        let _ = init_from_config(&config);
        let err = init_from_config(&config).unwrap_err();
        assert!(matches!(err, DaqError::Logging(_)));
    }
}
