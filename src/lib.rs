//! Core library for the pxi_daq waveform tooling.
//!
//! This library contains the digital waveform model, the transition-run codec
//! used to store waveforms compactly in HSDIO card memory, and the narrow session
//! interface through which waveforms and camera commands reach the hardware.
//!
//! # Features
//!
//! - `instrument_serial` - Enable the serial port session (serialport)
//!
//! # Example
//!
//! ```
//! use pxi_daq::codec::{compress, decompress};
//! use pxi_daq::waveform::Waveform;
//!
//! let wf = Waveform::try_new("pulse", 2, vec![vec![1, 0], vec![0, 1]], vec![3, 1]).unwrap();
//! assert_eq!(compress(&wf).unwrap().as_slice(), &[3, 1, 0, 1, 0, 1]);
//! assert_eq!(decompress(&wf).unwrap().total_samples(), 4);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod parse;
pub mod session;
pub mod waveform;

// Re-exports for convenience
pub use codec::{CompressedRecord, DataLayout, DecompressedWaveform};
pub use config::PxiConfig;
pub use error::{AppResult, DaqError};
pub use loader::{VerifyReport, WaveformLoader};
pub use session::{InstrumentSession, MockSession, SessionError};
pub use waveform::Waveform;
