//! Mock hardware session for testing
//!
//! This session simulates a driver without physical hardware. It provides:
//! - Simulated I/O latency
//! - Scripted read responses
//! - Controllable failure injection (as vendor status codes)
//! - Call and frame logging for test verification

use super::{check_status, InstrumentSession, SessionError, SessionResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct MockState {
    resource: Option<String>,
    latency_ms: u64,
    next_status: Option<i32>,
    responses: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    call_log: Vec<String>,
}

/// Mock instrument session
///
/// Clones share state, so a test can keep a handle while the loader owns another.
///
/// # Example
///
/// ```
/// use pxi_daq::session::MockSession;
///
/// let session = MockSession::new();
/// session.push_response(b"OK\r".to_vec());
/// assert!(session.call_log().is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

impl MockSession {
    /// Create a closed mock session with no latency
    pub fn new() -> Self {
        Self::default()
    }

    /// Set simulated latency in milliseconds
    pub fn with_latency(self, ms: u64) -> Self {
        self.set_latency(ms);
        self
    }

    /// Change simulated latency on a shared handle
    pub fn set_latency(&self, ms: u64) {
        self.lock().latency_ms = ms;
    }

    /// Make the next operation fail with the given driver status code.
    ///
    /// Positive codes are warnings and let the operation succeed.
    pub fn inject_status(&self, code: i32) {
        self.lock().next_status = Some(code);
    }

    /// Queue a response for the next `serial_read`
    pub fn push_response(&self, response: Vec<u8>) {
        self.lock().responses.push_back(response);
    }

    /// Every buffer passed to `serial_write`, in order
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    /// Get the call log
    pub fn call_log(&self) -> Vec<String> {
        self.lock().call_log.clone()
    }

    /// Clear the call log and written frames
    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.call_log.clear();
        state.written.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn begin(&self, call: String) -> SessionResult<()> {
        let latency = self.lock().latency_ms;
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let status = {
            let mut state = self.lock();
            state.call_log.push(call.clone());
            state.next_status.take()
        };
        match status {
            Some(code) => check_status(code, &call, "injected status"),
            None => Ok(()),
        }
    }

    fn require_open(&self) -> SessionResult<()> {
        if self.lock().resource.is_some() {
            Ok(())
        } else {
            Err(SessionError::NotOpen)
        }
    }
}

#[async_trait]
impl InstrumentSession for MockSession {
    async fn open_session(&mut self, resource: &str) -> SessionResult<()> {
        let current = self.lock().resource.clone();
        if let Some(open) = current {
            return Err(SessionError::AlreadyOpen(open));
        }
        self.begin(format!("open_session: {}", resource)).await?;
        self.lock().resource = Some(resource.to_string());
        debug!(resource, "Mock session opened");
        Ok(())
    }

    async fn serial_write(&mut self, data: &[u8], _timeout: Duration) -> SessionResult<usize> {
        self.require_open()?;
        self.begin(format!("serial_write: {} bytes", data.len())).await?;
        self.lock().written.push(data.to_vec());
        Ok(data.len())
    }

    async fn serial_read(&mut self, max_len: usize, timeout: Duration) -> SessionResult<Vec<u8>> {
        self.require_open()?;
        self.begin(format!("serial_read: {} bytes", max_len)).await?;
        let mut response = self
            .lock()
            .responses
            .pop_front()
            .ok_or(SessionError::Timeout {
                operation: "serial_read",
                timeout,
            })?;
        response.truncate(max_len);
        Ok(response)
    }

    async fn close_session(&mut self) -> SessionResult<()> {
        if self.lock().resource.is_none() {
            return Ok(());
        }
        self.begin("close_session".to_string()).await?;
        self.lock().resource = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().resource.is_some()
    }

    fn resource(&self) -> Option<String> {
        self.lock().resource.clone()
    }
}
