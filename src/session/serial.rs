//! Serial port session
//!
//! Implements [`InstrumentSession`] over an RS-232 / USB-serial link using the
//! `serialport` crate. Serial I/O is blocking, so every transfer runs on Tokio's
//! blocking pool. Without the `instrument_serial` feature the session builds but
//! refuses to open.

use super::{InstrumentSession, SessionError, SessionResult};
use crate::config::SessionConfig;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "instrument_serial")]
use serialport::SerialPort;
#[cfg(feature = "instrument_serial")]
use std::sync::{Arc, Mutex, PoisonError};

/// Builder for constructing a [`SerialSession`] with custom settings
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use pxi_daq::session::SerialSessionBuilder;
///
/// let session = SerialSessionBuilder::new(9600)
///     .with_timeout(Duration::from_millis(500))
///     .build();
/// ```
pub struct SerialSessionBuilder {
    baud_rate: u32,
    timeout: Duration,
}

impl SerialSessionBuilder {
    /// Create a new builder
    ///
    /// Default configuration:
    /// * timeout: 10 seconds
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the port-level read/write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the session (closed)
    pub fn build(self) -> SerialSession {
        SerialSession {
            baud_rate: self.baud_rate,
            timeout: self.timeout,
            resource: None,
            #[cfg(feature = "instrument_serial")]
            port: None,
        }
    }
}

/// Serial session for camera and controller links
pub struct SerialSession {
    baud_rate: u32,
    timeout: Duration,
    resource: Option<String>,
    #[cfg(feature = "instrument_serial")]
    port: Option<Arc<Mutex<Box<dyn SerialPort>>>>,
}

impl SerialSession {
    /// Create a session from configuration
    pub fn from_config(config: &SessionConfig) -> Self {
        SerialSessionBuilder::new(config.baud_rate)
            .with_timeout(config.timeout())
            .build()
    }

    /// Configured line speed
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Port-level timeout applied when the port is opened
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(feature = "instrument_serial")]
    fn port(&self) -> SessionResult<Arc<Mutex<Box<dyn SerialPort>>>> {
        self.port.clone().ok_or(SessionError::NotOpen)
    }
}

#[async_trait]
impl InstrumentSession for SerialSession {
    async fn open_session(&mut self, resource: &str) -> SessionResult<()> {
        if let Some(open) = &self.resource {
            return Err(SessionError::AlreadyOpen(open.clone()));
        }

        #[cfg(feature = "instrument_serial")]
        {
            let builder = serialport::new(resource, self.baud_rate).timeout(self.timeout);
            let port = tokio::task::spawn_blocking(move || -> SessionResult<Box<dyn SerialPort>> {
                builder.open().map_err(|e| SessionError::Io(e.into()))
            })
            .await
            .map_err(|e| SessionError::Io(std::io::Error::other(e)))??;
            self.port = Some(Arc::new(Mutex::new(port)));
            self.resource = Some(resource.to_string());
            debug!(resource, baud_rate = self.baud_rate, "Serial session opened");
            Ok(())
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            debug!(resource, "Serial session requested without serial support");
            Err(SessionError::FeatureNotEnabled("instrument_serial"))
        }
    }

    async fn serial_write(&mut self, data: &[u8], timeout: Duration) -> SessionResult<usize> {
        #[cfg(feature = "instrument_serial")]
        {
            let port = self.port()?;
            let data = data.to_vec();
            tokio::task::spawn_blocking(move || -> SessionResult<usize> {
                use std::io::Write;

                let mut guard = port.lock().unwrap_or_else(PoisonError::into_inner);
                guard
                    .set_timeout(timeout)
                    .map_err(|e| SessionError::Io(e.into()))?;
                guard.write_all(&data)?;
                guard.flush()?;
                Ok(data.len())
            })
            .await
            .map_err(|e| SessionError::Io(std::io::Error::other(e)))?
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            let _ = (data, timeout);
            Err(SessionError::NotOpen)
        }
    }

    async fn serial_read(&mut self, max_len: usize, timeout: Duration) -> SessionResult<Vec<u8>> {
        #[cfg(feature = "instrument_serial")]
        {
            let port = self.port()?;
            tokio::task::spawn_blocking(move || -> SessionResult<Vec<u8>> {
                use std::io::Read;

                let mut guard = port.lock().unwrap_or_else(PoisonError::into_inner);
                guard
                    .set_timeout(timeout)
                    .map_err(|e| SessionError::Io(e.into()))?;
                let mut buffer = vec![0u8; max_len];
                let read = guard.read(&mut buffer).map_err(|e| match e.kind() {
                    std::io::ErrorKind::TimedOut => SessionError::Timeout {
                        operation: "serial_read",
                        timeout,
                    },
                    _ => SessionError::Io(e),
                })?;
                buffer.truncate(read);
                Ok(buffer)
            })
            .await
            .map_err(|e| SessionError::Io(std::io::Error::other(e)))?
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            let _ = (max_len, timeout);
            Err(SessionError::NotOpen)
        }
    }

    async fn close_session(&mut self) -> SessionResult<()> {
        #[cfg(feature = "instrument_serial")]
        {
            self.port = None;
        }
        if let Some(resource) = self.resource.take() {
            debug!(resource = %resource, "Serial session closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.resource.is_some()
    }

    fn resource(&self) -> Option<String> {
        self.resource.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let session = SerialSessionBuilder::new(9600).build();
        assert_eq!(session.baud_rate(), 9600);
        assert_eq!(session.timeout(), Duration::from_secs(10));
        assert!(!session.is_open());
        assert!(session.resource().is_none());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_io() {
        let mut session = SerialSessionBuilder::new(9600).build();
        assert!(session.serial_write(b"x", Duration::from_millis(10)).await.is_err());
        assert!(session.serial_read(8, Duration::from_millis(10)).await.is_err());
        assert!(session.close_session().await.is_ok());
    }

    #[cfg(not(feature = "instrument_serial"))]
    #[tokio::test]
    async fn test_open_without_feature() {
        let mut session = SerialSessionBuilder::new(9600).build();
        let err = session.open_session("/dev/ttyUSB0").await.unwrap_err();
        assert!(matches!(err, SessionError::FeatureNotEnabled("instrument_serial")));
    }

    #[cfg(feature = "instrument_serial")]
    #[tokio::test]
    async fn test_open_missing_port_fails_without_blocking_runtime() {
        let mut session = SerialSessionBuilder::new(9600)
            .with_timeout(Duration::from_millis(50))
            .build();
        let result = crate::session::with_timeout(
            "open_session",
            Duration::from_secs(5),
            session.open_session("/dev/pxi_daq_no_such_port"),
        )
        .await;
        assert!(matches!(result, Err(SessionError::Io(_))));
        assert!(!session.is_open());
    }
}
