//! Text payload parsing for waveform fields.
//!
//! The experiment control message carries each waveform as a `name`, a
//! `transitions` element holding space-separated counts and a `states` element
//! holding one line of space-separated bits per run:
//!
//! ```text
//! <transitions>2 1 3</transitions>
//! <states>1 0
//! 0 1
//! 1 1</states>
//! ```
//!
//! Walking the message tree belongs to the caller; this module only turns the
//! element text into typed vectors.

use crate::error::{AppResult, DaqError};
use crate::waveform::{StateVector, Waveform};

/// Parse whitespace-separated transition counts.
pub fn parse_transitions(text: &str) -> AppResult<Vec<u32>> {
    text.split_whitespace()
        .map(|token| {
            token.parse::<u32>().map_err(|e| DaqError::Parse {
                field: "transitions",
                message: format!("'{}': {}", token, e),
            })
        })
        .collect()
}

/// Parse one state vector per non-empty line.
///
/// # Errors
/// - `Parse` for tokens that are not unsigned integers
/// - `ShapeMismatch` if the lines do not all have the same width
pub fn parse_states(text: &str) -> AppResult<Vec<StateVector>> {
    let states = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_state_line)
        .collect::<AppResult<Vec<_>>>()?;

    if let Some(first) = states.first() {
        if let Some((line, state)) = states
            .iter()
            .enumerate()
            .find(|(_, s)| s.len() != first.len())
        {
            return Err(DaqError::shape(format!(
                "state line {} has {} channels, expected {}",
                line,
                state.len(),
                first.len()
            )));
        }
    }

    Ok(states)
}

fn parse_state_line(line: &str) -> AppResult<StateVector> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<u8>().map_err(|e| DaqError::Parse {
                field: "states",
                message: format!("'{}': {}", token, e),
            })
        })
        .collect()
}

impl Waveform {
    /// Build a validated waveform from the text of its message fields.
    ///
    /// The channel width is taken from the first state line.
    pub fn from_text(
        name: impl Into<String>,
        transitions_text: &str,
        states_text: &str,
    ) -> AppResult<Waveform> {
        let transitions = parse_transitions(transitions_text)?;
        let states = parse_states(states_text)?;
        let width = states.first().map_or(0, Vec::len);
        Waveform::try_new(name, width, states, transitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transitions() {
        assert_eq!(parse_transitions("2 1  3\n").unwrap(), vec![2, 1, 3]);
        assert!(parse_transitions("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_transitions_rejects_negative() {
        let err = parse_transitions("4 -1").unwrap_err();
        assert!(matches!(err, DaqError::Parse { field: "transitions", .. }));
        assert!(err.to_string().contains("'-1'"));
    }

    #[test]
    fn test_parse_states_skips_blank_lines() {
        let states = parse_states("1 0\n\n0 1\r\n").unwrap();
        assert_eq!(states, vec![vec![1, 0], vec![0, 1]]);
    }

    #[test]
    fn test_parse_states_ragged() {
        let err = parse_states("1 0\n1 1 1").unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_from_text() {
        let wf = Waveform::from_text("pulse", "2 1 3", "1 0\n0 1\n1 1").unwrap();
        assert_eq!(wf.width(), 2);
        assert_eq!(wf.transitions(), &[2, 1, 3]);
        assert_eq!(wf.total_samples(), 6);
    }

    #[test]
    fn test_from_text_count_mismatch() {
        let err = Waveform::from_text("pulse", "2 1", "1 0\n0 1\n1 1").unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_from_text_empty() {
        let wf = Waveform::from_text("empty", "", "").unwrap();
        assert_eq!(wf.width(), 0);
        assert_eq!(wf.run_count(), 0);
    }
}
