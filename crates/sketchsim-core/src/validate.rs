//! Structural validation of generative responses and capture preconditions.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::command::{RawCommand, RawScene};
use crate::error::{CaptureKind, SessionError};

/// Returns the substring from the first `{` to the last `}`.
///
/// Models often wrap JSON in commentary or code fences; everything outside the
/// outermost braces is discarded.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn parse_wrapped<T: DeserializeOwned>(raw: &str) -> Result<T, SessionError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| SessionError::MalformedResponse("no JSON object found".to_string()))?;
    serde_json::from_str(json).map_err(|e| SessionError::MalformedResponse(e.to_string()))
}

/// Validates a voice-command response. It must be an object with a `summary`.
pub fn parse_command(raw: &str) -> Result<RawCommand, SessionError> {
    parse_wrapped(raw)
}

/// Validates a sketch-analysis response. It must be an object with `bodies`.
pub fn parse_scene(raw: &str) -> Result<RawScene, SessionError> {
    parse_wrapped(raw)
}

/// Fails fast when a capture is too small to be worth a service call.
pub fn ensure_capture_size(
    capture: CaptureKind,
    len: usize,
    required: usize,
) -> Result<(), SessionError> {
    if len < required {
        return Err(SessionError::InsufficientInput {
            capture,
            actual: len as u64,
            required: required as u64,
        });
    }
    Ok(())
}

/// Fails fast when an audio clip is shorter than the minimum duration.
#[allow(clippy::cast_possible_truncation)]
pub fn ensure_audio_duration(duration: Duration, required: Duration) -> Result<(), SessionError> {
    if duration < required {
        return Err(SessionError::InsufficientInput {
            capture: CaptureKind::Audio,
            actual: duration.as_millis() as u64,
            required: required.as_millis() as u64,
        });
    }
    Ok(())
}
