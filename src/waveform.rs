//! Digital waveform value type.
//!
//! A [`Waveform`] is a run-length description of a multi-channel digital signal:
//! `states[i]` is held for `transitions[i]` samples before the next run starts.
//! Values are immutable once built; callers that need a modified waveform build
//! a new one.

use crate::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};

/// One bit per digital channel, channel 0 first.
pub type StateVector = Vec<u8>;

/// Named run-length encoded digital waveform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waveform {
    name: String,
    width: usize,
    states: Vec<StateVector>,
    transitions: Vec<u32>,
}

impl Waveform {
    /// Build a waveform from raw parts without checking them.
    ///
    /// Parser output is untrusted, so the codec validates every waveform before
    /// using it. Use [`Waveform::try_new`] to reject bad input up front.
    pub fn new(
        name: impl Into<String>,
        width: usize,
        states: Vec<StateVector>,
        transitions: Vec<u32>,
    ) -> Self {
        Self {
            name: name.into(),
            width,
            states,
            transitions,
        }
    }

    /// Build a waveform and validate it.
    pub fn try_new(
        name: impl Into<String>,
        width: usize,
        states: Vec<StateVector>,
        transitions: Vec<u32>,
    ) -> AppResult<Self> {
        let waveform = Self::new(name, width, states, transitions);
        waveform.validate()?;
        Ok(waveform)
    }

    /// Check the shape and bit-value invariants.
    ///
    /// # Errors
    /// - `ShapeMismatch` if `states` and `transitions` differ in length or any
    ///   state vector is not `width` wide
    /// - `InvalidState` if a state holds anything other than 0 or 1
    pub fn validate(&self) -> AppResult<()> {
        if self.states.len() != self.transitions.len() {
            return Err(DaqError::shape(format!(
                "waveform '{}' has {} states but {} transitions",
                self.name,
                self.states.len(),
                self.transitions.len()
            )));
        }

        for (run, state) in self.states.iter().enumerate() {
            if state.len() != self.width {
                return Err(DaqError::shape(format!(
                    "waveform '{}' state {} has width {}, expected {}",
                    self.name,
                    run,
                    state.len(),
                    self.width
                )));
            }
            if let Some((channel, &value)) = state.iter().enumerate().find(|(_, &v)| v > 1) {
                return Err(DaqError::InvalidState {
                    run,
                    channel,
                    value,
                });
            }
        }

        Ok(())
    }

    /// Waveform name, unique within a collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of digital channels per state.
    pub fn width(&self) -> usize {
        self.width
    }

    /// State vectors, one per run.
    pub fn states(&self) -> &[StateVector] {
        &self.states
    }

    /// Sample counts, one per run.
    pub fn transitions(&self) -> &[u32] {
        &self.transitions
    }

    /// Number of runs (state/transition pairs).
    pub fn run_count(&self) -> usize {
        self.states.len()
    }

    /// Total sample count, the sum of all transition counts.
    pub fn total_samples(&self) -> usize {
        self.transitions.iter().map(|&t| t as usize).sum()
    }

    /// Iterate over `(transition_count, state)` pairs in order.
    pub fn runs(&self) -> impl Iterator<Item = (u32, &[u8])> + '_ {
        self.transitions
            .iter()
            .zip(self.states.iter())
            .map(|(&t, s)| (t, s.as_slice()))
    }

    /// Split the channels across cards of `card_width` channels each.
    ///
    /// Every part keeps the name and transitions of the original; the last part
    /// is narrower when `width` is not a multiple of `card_width`. A waveform
    /// with zero channels yields no parts.
    ///
    /// # Errors
    /// - `ShapeMismatch` if `card_width` is zero or the waveform is malformed
    pub fn split_channels(&self, card_width: usize) -> AppResult<Vec<Waveform>> {
        if card_width == 0 {
            return Err(DaqError::shape("card width must be at least one channel"));
        }
        self.validate()?;

        let parts = (0..self.width)
            .step_by(card_width)
            .map(|start| {
                let end = (start + card_width).min(self.width);
                let states = self
                    .states
                    .iter()
                    .map(|state| state[start..end].to_vec())
                    .collect();
                Waveform::new(
                    self.name.clone(),
                    end - start,
                    states,
                    self.transitions.clone(),
                )
            })
            .collect();

        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Waveform {
        Waveform::new(
            "pulse",
            2,
            vec![vec![1, 0], vec![0, 1], vec![1, 1]],
            vec![2, 1, 3],
        )
    }

    #[test]
    fn test_accessors() {
        let wf = sample();
        assert_eq!(wf.name(), "pulse");
        assert_eq!(wf.width(), 2);
        assert_eq!(wf.run_count(), 3);
        assert_eq!(wf.total_samples(), 6);
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = Waveform::try_new("bad", 2, vec![vec![1, 0]], vec![1, 2]).unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_ragged_state_rejected() {
        let err = Waveform::try_new("bad", 2, vec![vec![1, 0], vec![1]], vec![1, 2]).unwrap_err();
        assert!(err.is_shape_mismatch());
        assert!(err.to_string().contains("state 1 has width 1"));
    }

    #[test]
    fn test_non_binary_state_rejected() {
        let err = Waveform::try_new("bad", 2, vec![vec![1, 2]], vec![1]).unwrap_err();
        assert!(matches!(
            err,
            DaqError::InvalidState {
                run: 0,
                channel: 1,
                value: 2
            }
        ));
    }

    #[test]
    fn test_split_channels() {
        let wf = Waveform::new(
            "wide",
            5,
            vec![vec![1, 0, 1, 1, 0], vec![0, 1, 0, 0, 1]],
            vec![4, 2],
        );
        let parts = wf.split_channels(2).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].states(), &[vec![1, 0], vec![0, 1]]);
        assert_eq!(parts[1].states(), &[vec![1, 1], vec![0, 0]]);
        assert_eq!(parts[2].width(), 1);
        assert_eq!(parts[2].states(), &[vec![0], vec![1]]);
        assert!(parts.iter().all(|p| p.transitions() == [4, 2]));
        assert!(parts.iter().all(|p| p.name() == "wide"));
    }

    #[test]
    fn test_split_zero_card_width() {
        assert!(sample().split_channels(0).unwrap_err().is_shape_mismatch());
    }
}
