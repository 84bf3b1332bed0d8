//! Command/response helper for camera serial control.
//!
//! The camera link carries short ASCII commands terminated by a carriage
//! return. The camera echoes accepted commands and answers `E0`..`E6` on
//! failure.

use super::{with_timeout, InstrumentSession, SessionResult};
use tracing::{debug, warn};

/// Terminator for every command and response on the camera link
pub const COMMAND_TERMINATOR: char = '\r';

/// Read buffer size for a single response
pub const RESPONSE_BUFFER_LEN: usize = 100;

/// Describe a camera error response, if `response` is one.
pub fn camera_error_description(response: &str, command: &str) -> Option<String> {
    let description = match response.trim_end_matches(COMMAND_TERMINATOR) {
        "E0" => "E0 : camera above max temperature".to_string(),
        "E1" => "E1 : Error on reception: Framing, parity or overrun error".to_string(),
        "E2" => "E2 : Error on reception: input buffer overload".to_string(),
        "E3" => format!("E3 : Command {} contains an error", command),
        "E4" => format!("E4 : Command {} is not suitable for current operating mode", command),
        "E5" => format!("E5 : Command {} has error in parameters", command),
        "E6" => format!(
            "E6 : Command {} has parameters unsuitable for current operating mode",
            command
        ),
        _ => return None,
    };
    Some(description)
}

/// Send one command and return the raw response, terminator included.
///
/// When `expected` is given and the response differs, a warning naming the
/// camera error (if any) is logged; the response is still returned so the
/// caller can decide whether the mismatch matters.
pub async fn serial_query<S>(
    session: &mut S,
    command: &str,
    expected: Option<&str>,
    timeout: std::time::Duration,
) -> SessionResult<String>
where
    S: InstrumentSession + ?Sized,
{
    let framed = format!("{}{}", command, COMMAND_TERMINATOR);
    with_timeout("serial_write", timeout, session.serial_write(framed.as_bytes(), timeout)).await?;

    let raw = with_timeout(
        "serial_read",
        timeout,
        session.serial_read(RESPONSE_BUFFER_LEN, timeout),
    )
    .await?;
    let response = String::from_utf8_lossy(&raw).into_owned();
    debug!(command, response = response.trim_end(), "Camera serial exchange");

    if let Some(expected) = expected {
        if response.trim_end_matches(COMMAND_TERMINATOR) != expected {
            let detail = camera_error_description(&response, command).unwrap_or_default();
            warn!(
                command,
                expected,
                received = response.trim_end(),
                detail = %detail,
                "Unexpected camera response"
            );
        }
    }

    Ok(response)
}
