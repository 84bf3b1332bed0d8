//! Hardware session capability interface
//!
//! Waveform loading and camera control only ever need to open a session on a
//! resource, push bytes down it, read bytes back and close it again. This module
//! defines that narrow surface so the loader does not depend on how a driver is
//! reached (vendor library, serial port, or an in-memory mock).
//!
//! Sessions are owned explicitly by whoever drives the hardware: acquire with
//! [`InstrumentSession::open_session`] on connect, release with
//! [`InstrumentSession::close_session`] on disconnect.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub mod mock;
pub mod query;
pub mod serial;

pub use mock::MockSession;
pub use query::{camera_error_description, serial_query};
pub use serial::{SerialSession, SerialSessionBuilder};

/// Errors reported by a hardware session
#[derive(Debug, Error)]
pub enum SessionError {
    /// I/O was attempted before `open_session`.
    #[error("Session not open")]
    NotOpen,

    /// A session is already held on the named resource.
    #[error("Session already open on '{0}'")]
    AlreadyOpen(String),

    /// The operation did not finish within its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Session operation that expired
        operation: &'static str,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// The driver returned a negative status code.
    #[error("Driver error {code} in {context}: {message}")]
    Driver {
        /// Vendor status code
        code: i32,
        /// Operation that reported the status
        context: String,
        /// Driver-provided description
        message: String,
    },

    /// Transport-level I/O failure.
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport needs a cargo feature this build lacks.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(&'static str),
}

/// Result alias for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Capability interface for an instrument reached through a driver session
#[async_trait]
pub trait InstrumentSession: Send + Sync {
    /// Open a session on `resource` (e.g. "PXI1Slot2", "img0", "/dev/ttyUSB0")
    ///
    /// # Errors
    /// - `AlreadyOpen` if a session is already held
    /// - `Driver` / `Io` if the driver refuses the resource
    async fn open_session(&mut self, resource: &str) -> SessionResult<()>;

    /// Write `data` to the session, returning the number of bytes accepted
    async fn serial_write(&mut self, data: &[u8], timeout: Duration) -> SessionResult<usize>;

    /// Read up to `max_len` bytes from the session
    async fn serial_read(&mut self, max_len: usize, timeout: Duration) -> SessionResult<Vec<u8>>;

    /// Release the session. Closing a session that is not open is a no-op.
    async fn close_session(&mut self) -> SessionResult<()>;

    /// Whether a session is currently held
    fn is_open(&self) -> bool;

    /// Resource the session is open on, if any
    fn resource(&self) -> Option<String>;
}

/// Interpret a vendor driver status code.
///
/// 0 is success, positive codes are warnings (logged and ignored), negative
/// codes are errors.
pub fn check_status(code: i32, context: &str, message: &str) -> SessionResult<()> {
    match code {
        0 => Ok(()),
        c if c > 0 => {
            warn!(code = c, context, message, "Driver warning");
            Ok(())
        }
        c => Err(SessionError::Driver {
            code: c,
            context: context.to_string(),
            message: message.to_string(),
        }),
    }
}

/// Run a session future under a deadline, mapping expiry to `Timeout`
pub async fn with_timeout<T, F>(operation: &'static str, timeout: Duration, fut: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| SessionError::Timeout { operation, timeout })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_check_status_success() {
        assert!(check_status(0, "open", "").is_ok());
    }

    #[traced_test]
    #[test]
    fn test_check_status_warning_is_logged() {
        assert!(check_status(3, "serial write", "buffer nearly full").is_ok());
        assert!(logs_contain("Driver warning"));
    }

    #[test]
    fn test_check_status_error() {
        let err = check_status(-1074130544, "abort", "invalid session").unwrap_err();
        assert!(matches!(err, SessionError::Driver { code: -1074130544, .. }));
        assert!(err.to_string().contains("abort"));
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: SessionResult<()> = with_timeout("read", Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(SessionError::Timeout { operation: "read", .. })));
    }
}
