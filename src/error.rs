//! Custom error types for the crate.
//!
//! This module defines the primary error type, `DaqError`, used by the waveform
//! model, the codec and the loader. Using the `thiserror` crate, it provides a
//! centralized and consistent way to report the few things that can go wrong
//! between receiving waveform data and programming it onto hardware.
//!
//! ## Error Hierarchy
//!
//! - **`ShapeMismatch`**: paired sequences disagree in length, a state vector does
//!   not have the waveform's declared width, or a flat buffer is not a whole number
//!   of rows. Every codec operation checks this before producing any output.
//! - **`InvalidState`**: a state vector holds a value other than 0 or 1.
//! - **`Parse`**: a text payload for a waveform field could not be parsed.
//! - **`Session`**: wraps [`SessionError`] from the hardware capability layer.
//! - **`LoadRejected`**: the device answered a waveform load with something other
//!   than an acknowledgement.
//! - **`Config`**: wraps [`ConfigError`] from configuration loading.
//! - **`Logging`**: the tracing subscriber could not be installed.
//!
//! By using `#[from]`, `DaqError` can be created from the underlying error types,
//! keeping `?` usable across the session and config boundaries.

use crate::config::ConfigError;
use crate::session::SessionError;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Errors raised between receiving waveform data and programming hardware.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Paired sequences or a flat buffer have inconsistent dimensions.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A state vector holds a value other than 0 or 1.
    #[error("Invalid state value {value} at run {run}, channel {channel} (expected 0 or 1)")]
    InvalidState {
        /// Run index of the offending state
        run: usize,
        /// Channel index within the state
        channel: usize,
        /// Value found (saturated to `u8`)
        value: u8,
    },

    /// A text payload could not be parsed.
    #[error("Failed to parse {field}: {message}")]
    Parse {
        /// Waveform field being parsed
        field: &'static str,
        /// Parser diagnostic
        message: String,
    },

    /// Failure in the hardware session layer.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// The device did not acknowledge a waveform load.
    #[error("Waveform '{name}' rejected by device: {response}")]
    LoadRejected {
        /// Waveform that was being loaded
        name: String,
        /// Reply received instead of the acknowledgement
        response: String,
    },

    /// Configuration could not be loaded or validated.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The tracing subscriber could not be installed.
    #[error("Logging initialisation failed: {0}")]
    Logging(String),

    /// Filesystem or stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaqError {
    /// Shorthand for building a [`DaqError::ShapeMismatch`].
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        DaqError::ShapeMismatch(message.into())
    }

    /// True for errors raised by shape validation.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, DaqError::ShapeMismatch(_))
    }
}
