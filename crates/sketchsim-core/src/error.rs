//! Error taxonomy for command processing.

use std::time::Duration;

/// Which capture a precondition failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Image,
    Audio,
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

/// Failure classes, including the ones that are only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InsufficientInput,
    Timeout,
    MalformedResponse,
    /// Constraint or update referencing an unknown id. Dropped, never raised.
    DanglingReference,
    /// Non-finite values reaching physics or effects. Skipped, never raised.
    NumericInstability,
    Service,
    Superseded,
}

impl ErrorKind {
    /// Stable name used as a structured log field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientInput => "insufficient_input",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
            Self::DanglingReference => "dangling_reference",
            Self::NumericInstability => "numeric_instability",
            Self::Service => "service",
            Self::Superseded => "superseded",
        }
    }
}

/// Error returned by a generative service implementation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{capture} capture too short: {actual} < {required}")]
    InsufficientInput {
        capture: CaptureKind,
        actual: u64,
        required: u64,
    },

    #[error("service call timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("scene was reset while the command was in flight")]
    Superseded,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientInput { .. } => ErrorKind::InsufficientInput,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::Service(_) => ErrorKind::Service,
            Self::Superseded => ErrorKind::Superseded,
        }
    }

    /// Message suitable for showing to the person who issued the command.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InsufficientInput {
                capture: CaptureKind::Audio,
                ..
            } => "Recording too short. Hold the button and speak your command.",
            Self::InsufficientInput {
                capture: CaptureKind::Image,
                ..
            } => "Nothing to analyze yet. Draw something and try again.",
            Self::Timeout(_) => "Sorry, I couldn't understand that. Please try again.",
            Self::MalformedResponse(_) => "The AI returned an invalid response. Please try again.",
            Self::Service(_) => "Something went wrong. Please try again.",
            Self::Superseded => "The scene was reset before the command finished.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_is_distinct_from_timeout() {
        let malformed = SessionError::MalformedResponse("no braces".into());
        let timeout = SessionError::Timeout(Duration::from_secs(30));

        assert_eq!(malformed.kind(), ErrorKind::MalformedResponse);
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_ne!(malformed.user_message(), timeout.user_message());
    }

    #[test]
    fn test_display() {
        let err = SessionError::InsufficientInput {
            capture: CaptureKind::Audio,
            actual: 10,
            required: 1000,
        };
        assert_eq!(err.to_string(), "audio capture too short: 10 < 1000");
        assert_eq!(ErrorKind::DanglingReference.as_str(), "dangling_reference");
    }
}
