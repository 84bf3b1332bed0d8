//! Transition-run waveform codec.
//!
//! Encodes a [`Waveform`] into the flat record loaded onto waveform generator
//! memory and expands it back into per-sample channel data.
//!
//! # Record Layout
//!
//! Each run is written as `[transition_count, bit_0, ..., bit_{W-1}]`, so a
//! waveform of `N` runs over `W` channels produces `N * (W + 1)` words:
//!
//! ```text
//! states = [[1,0],[0,1],[1,1]]   transitions = [2,1,3]
//! record = [2,1,0, 1,0,1, 3,1,1]
//! ```
//!
//! Every operation validates its input before producing output and never logs;
//! callers decide how to report a failed waveform.

use crate::error::{AppResult, DaqError};
use crate::waveform::Waveform;
use serde::{Deserialize, Serialize};

/// Maximum channel count that fits a packed sample word.
pub const PACKED_WORD_BITS: usize = 32;

/// Flattened run encoding of a waveform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressedRecord {
    width: usize,
    data: Vec<u32>,
}

impl CompressedRecord {
    /// Channel count of the encoded states.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of encoded runs.
    pub fn run_count(&self) -> usize {
        self.data.len() / (self.width + 1)
    }

    /// The record words.
    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    /// Word count, `run_count * (width + 1)`.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a waveform with no runs.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Take the record words.
    pub fn into_inner(self) -> Vec<u32> {
        self.data
    }

    /// Little-endian wire encoding, four bytes per word.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|word| word.to_le_bytes()).collect()
    }
}

/// Order of samples in a decompressed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLayout {
    /// Row-major: every channel of sample 0, then every channel of sample 1, ...
    #[default]
    GroupBySample,
    /// Column-major: every sample of channel 0, then every sample of channel 1, ...
    GroupByChannel,
}

/// Per-sample channel data produced by [`decompress`].
///
/// Only the codec builds these, so `samples` always holds
/// `width * total_samples` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecompressedWaveform {
    width: usize,
    total_samples: usize,
    layout: DataLayout,
    samples: Vec<u8>,
}

impl DecompressedWaveform {
    /// Channels per sample.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of samples (rows of the logical matrix).
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Ordering of the flat buffer.
    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    /// The flat buffer in [`layout`](Self::layout) order.
    pub fn as_flat(&self) -> &[u8] {
        &self.samples
    }

    /// Take the flat buffer.
    pub fn into_flat(self) -> Vec<u8> {
        self.samples
    }

    /// The `(total_samples, width)` matrix, one row per sample.
    pub fn rows(&self) -> AppResult<Vec<Vec<u8>>> {
        match self.layout {
            DataLayout::GroupBySample if self.width > 0 => reshape_flat(&self.samples, self.width),
            DataLayout::GroupByChannel if self.total_samples > 0 => {
                let columns = reshape_flat(&self.samples, self.total_samples)?;
                Ok((0..self.total_samples)
                    .map(|s| columns.iter().map(|column| column[s]).collect())
                    .collect())
            }
            _ => Ok(vec![Vec::new(); self.total_samples]),
        }
    }

    /// All samples of one channel, or `None` if `channel` is out of range.
    pub fn channel(&self, channel: usize) -> Option<Vec<u8>> {
        if channel >= self.width {
            return None;
        }
        match self.layout {
            DataLayout::GroupBySample => Some(
                self.samples
                    .iter()
                    .skip(channel)
                    .step_by(self.width)
                    .copied()
                    .collect(),
            ),
            DataLayout::GroupByChannel => {
                let start = channel * self.total_samples;
                self.samples
                    .get(start..start + self.total_samples)
                    .map(<[u8]>::to_vec)
            }
        }
    }
}

/// Encode a waveform as a flat run record.
///
/// # Errors
/// - `ShapeMismatch` if the waveform's states and transitions disagree
pub fn compress(waveform: &Waveform) -> AppResult<CompressedRecord> {
    waveform.validate()?;

    let width = waveform.width();
    let mut data = Vec::with_capacity(waveform.run_count() * (width + 1));
    for (transition, state) in waveform.runs() {
        data.push(transition);
        data.extend(state.iter().map(|&bit| u32::from(bit)));
    }

    Ok(CompressedRecord { width, data })
}

/// Expand a waveform into per-sample channel values, grouped by sample.
///
/// Runs with a zero transition count contribute no samples.
pub fn decompress(waveform: &Waveform) -> AppResult<DecompressedWaveform> {
    decompress_with(waveform, DataLayout::GroupBySample)
}

/// Expand a waveform into per-sample channel values in the given layout.
pub fn decompress_with(waveform: &Waveform, layout: DataLayout) -> AppResult<DecompressedWaveform> {
    waveform.validate()?;

    let width = waveform.width();
    let total_samples = waveform.total_samples();
    let mut samples = Vec::with_capacity(total_samples * width);

    match layout {
        DataLayout::GroupBySample => {
            for (transition, state) in waveform.runs() {
                for _ in 0..transition {
                    samples.extend_from_slice(state);
                }
            }
        }
        DataLayout::GroupByChannel => {
            for channel in 0..width {
                for (transition, state) in waveform.runs() {
                    samples.extend(std::iter::repeat(state[channel]).take(transition as usize));
                }
            }
        }
    }

    Ok(DecompressedWaveform {
        width,
        total_samples,
        layout,
        samples,
    })
}

/// Pack a state vector into one word, first channel in the most significant
/// used bit.
///
/// # Errors
/// - `ShapeMismatch` if the state is wider than [`PACKED_WORD_BITS`]
pub fn pack_state(state: &[u8]) -> AppResult<u32> {
    if state.len() > PACKED_WORD_BITS {
        return Err(DaqError::shape(format!(
            "state of width {} does not fit a {}-bit word",
            state.len(),
            PACKED_WORD_BITS
        )));
    }
    Ok(state
        .iter()
        .fold(0u32, |word, &bit| (word << 1) | u32::from(bit & 1)))
}

/// Expand a waveform into one packed word per sample.
pub fn decompress_packed(waveform: &Waveform) -> AppResult<Vec<u32>> {
    waveform.validate()?;
    if waveform.width() > PACKED_WORD_BITS {
        return Err(DaqError::shape(format!(
            "waveform '{}' has {} channels, packed output supports at most {}",
            waveform.name(),
            waveform.width(),
            PACKED_WORD_BITS
        )));
    }

    let mut words = Vec::with_capacity(waveform.total_samples());
    for (transition, state) in waveform.runs() {
        let word = pack_state(state)?;
        words.extend(std::iter::repeat(word).take(transition as usize));
    }
    Ok(words)
}

/// Rebuild a waveform from a flat run record of `width` channels.
///
/// # Errors
/// - `ShapeMismatch` if the record length is not a multiple of `width + 1`
/// - `InvalidState` if a decoded state value is not 0 or 1
pub fn expand_record(name: impl Into<String>, record: &[u32], width: usize) -> AppResult<Waveform> {
    let runs = reshape_flat(record, width + 1)?;

    let mut states = Vec::with_capacity(runs.len());
    let mut transitions = Vec::with_capacity(runs.len());
    for (run, row) in runs.into_iter().enumerate() {
        transitions.push(row[0]);
        let state = row[1..]
            .iter()
            .enumerate()
            .map(|(channel, &value)| {
                u8::try_from(value)
                    .ok()
                    .filter(|&bit| bit <= 1)
                    .ok_or(DaqError::InvalidState {
                        run,
                        channel,
                        value: value.min(u32::from(u8::MAX)) as u8,
                    })
            })
            .collect::<AppResult<Vec<u8>>>()?;
        states.push(state);
    }

    Waveform::try_new(name, width, states, transitions)
}

/// View a flat row-major buffer as rows of `row_width` elements.
///
/// # Errors
/// - `ShapeMismatch` if `row_width` is zero or the length is not an exact
///   multiple of it
pub fn reshape_flat<T: Clone>(flat: &[T], row_width: usize) -> AppResult<Vec<Vec<T>>> {
    if row_width == 0 {
        return Err(DaqError::shape("row width must be non-zero"));
    }
    if flat.len() % row_width != 0 {
        return Err(DaqError::shape(format!(
            "flat length {} is not a multiple of row width {}",
            flat.len(),
            row_width
        )));
    }
    Ok(flat.chunks_exact(row_width).map(<[T]>::to_vec).collect())
}
