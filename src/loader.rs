//! Waveform loading and verification over an instrument session.
//!
//! The loader owns its session handle. Callers acquire the hardware with
//! [`WaveformLoader::connect`] and release it with [`WaveformLoader::disconnect`];
//! nothing here is global.
//!
//! ## Load framing
//!
//! A waveform is sent as a header line followed by the compressed record:
//!
//! ```text
//! WFM <name> <runs> <width>\r
//! <runs * (width + 1) little-endian u32 words>
//! ```
//!
//! The device answers with a single line, `OK\r` on success.
//!
//! Codec failures are fatal for the waveform concerned and are reported before
//! any bytes reach the device.

use crate::codec::{compress, decompress, reshape_flat};
use crate::config::SessionConfig;
use crate::error::{AppResult, DaqError};
use crate::session::{with_timeout, InstrumentSession};
use crate::waveform::Waveform;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Acknowledgement expected after a waveform load
pub const LOAD_ACK: &str = "OK";

/// Maximum acknowledgement length read back from the device
const ACK_BUFFER_LEN: usize = 64;

/// Outcome of comparing a waveform with captured output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Samples the waveform expands to
    pub expected_samples: usize,
    /// Samples present in the capture
    pub captured_samples: usize,
    /// First sample index where the two differ, if any
    pub first_mismatch: Option<usize>,
}

impl VerifyReport {
    /// True when the capture reproduces the waveform exactly
    pub fn is_match(&self) -> bool {
        self.first_mismatch.is_none() && self.expected_samples == self.captured_samples
    }
}

/// Loads compressed waveforms onto a device through an [`InstrumentSession`]
pub struct WaveformLoader<S> {
    session: S,
    timeout: Duration,
}

impl<S: InstrumentSession> WaveformLoader<S> {
    /// Wrap a session with the given per-operation timeout
    pub fn new(session: S, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    /// Wrap a session using the configured timeout
    pub fn from_config(session: S, config: &SessionConfig) -> Self {
        Self::new(session, config.timeout())
    }

    /// The owned session
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Whether the session is currently open
    pub fn is_connected(&self) -> bool {
        self.session.is_open()
    }

    /// Open the session on `resource`
    pub async fn connect(&mut self, resource: &str) -> AppResult<()> {
        with_timeout("open_session", self.timeout, self.session.open_session(resource)).await?;
        info!(resource, "Waveform session connected");
        Ok(())
    }

    /// Close the session
    pub async fn disconnect(&mut self) -> AppResult<()> {
        with_timeout("close_session", self.timeout, self.session.close_session()).await?;
        info!("Waveform session disconnected");
        Ok(())
    }

    /// Compress `waveform` and write it to the device.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    /// - `ShapeMismatch` / `InvalidState` if the waveform is malformed (no I/O happens)
    /// - `Session` on driver failure or timeout
    /// - `LoadRejected` if the device does not acknowledge the load
    #[instrument(skip(self, waveform), fields(waveform = %waveform.name()))]
    pub async fn load(&mut self, waveform: &Waveform) -> AppResult<usize> {
        let record = compress(waveform)?;
        let header = format!(
            "WFM {} {} {}\r",
            waveform.name(),
            record.run_count(),
            record.width()
        );
        let payload = record.to_le_bytes();

        let mut written = with_timeout(
            "serial_write",
            self.timeout,
            self.session.serial_write(header.as_bytes(), self.timeout),
        )
        .await?;
        written += with_timeout(
            "serial_write",
            self.timeout,
            self.session.serial_write(&payload, self.timeout),
        )
        .await?;
        debug!(bytes = written, runs = record.run_count(), "Waveform record written");

        let ack = with_timeout(
            "serial_read",
            self.timeout,
            self.session.serial_read(ACK_BUFFER_LEN, self.timeout),
        )
        .await?;
        let ack = String::from_utf8_lossy(&ack).trim().to_string();
        if ack != LOAD_ACK {
            warn!(response = %ack, "Waveform load rejected");
            return Err(DaqError::LoadRejected {
                name: waveform.name().to_string(),
                response: ack,
            });
        }

        info!(
            samples = waveform.total_samples(),
            channels = waveform.width(),
            "Waveform loaded"
        );
        Ok(written)
    }

    /// Load waveforms in order, stopping at the first failure.
    ///
    /// Returns the number of waveforms loaded.
    pub async fn load_all(&mut self, waveforms: &[Waveform]) -> AppResult<usize> {
        for waveform in waveforms {
            self.load(waveform).await?;
        }
        Ok(waveforms.len())
    }
}

/// Split `waveform` by `card_width` channels and load each part on its own card.
///
/// Parts are paired with loaders in order; every part must have a loader.
///
/// # Errors
/// - `ShapeMismatch` if the waveform has no channels, or needs more cards than
///   there are loaders
pub async fn load_across_cards<S: InstrumentSession>(
    loaders: &mut [WaveformLoader<S>],
    waveform: &Waveform,
    card_width: usize,
) -> AppResult<usize> {
    let parts = waveform.split_channels(card_width)?;
    if parts.is_empty() {
        return Err(DaqError::shape(format!(
            "waveform '{}' has no channels to load",
            waveform.name()
        )));
    }
    if parts.len() > loaders.len() {
        return Err(DaqError::shape(format!(
            "waveform '{}' needs {} cards but {} are connected",
            waveform.name(),
            parts.len(),
            loaders.len()
        )));
    }

    let mut written = 0;
    for (loader, part) in loaders.iter_mut().zip(parts.iter()) {
        written += loader.load(part).await?;
    }
    Ok(written)
}

/// Compare a waveform with captured output, `waveform.width()` values per sample.
///
/// # Errors
/// - `ShapeMismatch` if the waveform is malformed or the capture is not a whole
///   number of samples (any non-empty capture, for a waveform with no channels)
pub fn verify(waveform: &Waveform, captured: &[u8]) -> AppResult<VerifyReport> {
    let expected = decompress(waveform)?;
    let expected_rows = expected.rows()?;
    let captured_rows = match waveform.width() {
        0 if captured.is_empty() => Vec::new(),
        0 => {
            return Err(DaqError::shape(format!(
                "waveform '{}' has no channels but {} values were captured",
                waveform.name(),
                captured.len()
            )))
        }
        width => reshape_flat(captured, width)?,
    };

    let first_mismatch = expected_rows
        .iter()
        .zip(captured_rows.iter())
        .position(|(want, got)| want != got)
        .or_else(|| {
            (expected_rows.len() != captured_rows.len())
                .then_some(expected_rows.len().min(captured_rows.len()))
        });

    Ok(VerifyReport {
        expected_samples: expected_rows.len(),
        captured_samples: captured_rows.len(),
        first_mismatch,
    })
}
