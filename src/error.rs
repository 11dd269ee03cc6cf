//! Error types for Parley

use thiserror::Error;

use crate::knowledge::ExtractError;
use crate::session::SessionState;
use crate::voice::{CaptureError, PlaybackError};

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credentials, invalid limits)
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech capture is not supported on this host
    #[error("capture unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Speech capture failed
    #[error("capture error: {0}")]
    Capture(CaptureError),

    /// Capture produced no usable text
    #[error("no speech was captured")]
    EmptyInput,

    /// Reply generation failed
    #[error("generation error: {0}")]
    Generation(String),

    /// Speech synthesis failed
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// A turn was requested while another is in flight
    #[error("a turn is already in flight (state: {0})")]
    ConcurrentTurn(SessionState),

    /// Audio playback failed
    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// Document text extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// Embedding error
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure reported by a generation or synthesis provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider has no credentials or endpoint
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Provider call failed
    #[error("provider error: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Provider(e.to_string())
    }
}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::Unsupported => Self::CapabilityUnavailable(e.to_string()),
            other => Self::Capture(other),
        }
    }
}

impl Error {
    /// Normalize a generation provider failure
    #[must_use]
    pub fn generation(e: ProviderError) -> Self {
        match e {
            ProviderError::NotConfigured(msg) => Self::Config(msg),
            ProviderError::Provider(msg) => Self::Generation(msg),
        }
    }

    /// Normalize a synthesis provider failure
    #[must_use]
    pub fn synthesis(e: ProviderError) -> Self {
        match e {
            ProviderError::NotConfigured(msg) => Self::Config(msg),
            ProviderError::Provider(msg) => Self::Synthesis(msg),
        }
    }

    /// Classify this error for the session error slot
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
            Self::Capture(_) => ErrorKind::Capture,
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::Generation(_) | Self::Embedding(_) => ErrorKind::Generation,
            Self::Synthesis(_) => ErrorKind::Synthesis,
            Self::ConcurrentTurn(_) => ErrorKind::ConcurrentTurn,
            Self::Playback(_) => ErrorKind::Playback,
            Self::Extraction(_) | Self::NotFound(_) => ErrorKind::Knowledge,
            Self::Io(_) | Self::Http(_) => ErrorKind::Internal,
        }
    }

    /// Short message suitable for showing to the user
    ///
    /// Technical detail stays in the `Display` output.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Config(_) => "The assistant is not configured. Check the API key.",
            Self::CapabilityUnavailable(_) => "Speech recognition is not supported here.",
            Self::Capture(CaptureError::NoSignal) => {
                "No audio was detected. Try speaking closer to the microphone."
            }
            Self::Capture(CaptureError::PermissionDenied) => {
                "Permission to use the microphone was denied."
            }
            Self::Capture(CaptureError::Timeout(_)) => "Nothing was heard in time. Try again.",
            Self::Capture(_) => "The microphone could not be used.",
            Self::EmptyInput => "No valid speech was detected.",
            Self::Generation(_) | Self::Embedding(_) => "Error in the conversation.",
            Self::Synthesis(_) => "The reply could not be converted to audio.",
            Self::ConcurrentTurn(_) => "Already listening.",
            Self::Playback(_) => "The audio could not be played.",
            Self::Extraction(_) => "The document could not be read.",
            Self::NotFound(_) => "Not found.",
            Self::Io(_) | Self::Http(_) => "Something went wrong.",
        }
    }
}

/// Error categories surfaced to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    CapabilityUnavailable,
    Capture,
    EmptyInput,
    Generation,
    Synthesis,
    ConcurrentTurn,
    Playback,
    Knowledge,
    Internal,
}

impl ErrorKind {
    /// Whether a new turn may succeed without reconfiguration
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        !matches!(self, Self::Configuration | Self::CapabilityUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_unsupported_capture_is_capability_unavailable() {
        let err = Error::from(CaptureError::Unsupported);
        assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
        assert!(!err.kind().is_recoverable());
    }

    #[test]
    fn test_capture_timeout_is_recoverable() {
        let err = Error::from(CaptureError::Timeout(Duration::from_secs(10)));
        assert_eq!(err.kind(), ErrorKind::Capture);
        assert!(err.kind().is_recoverable());
        assert_eq!(err.user_message(), "Nothing was heard in time. Try again.");
    }

    #[test]
    fn test_not_configured_provider_maps_to_configuration() {
        let err = Error::generation(ProviderError::NotConfigured("no key".to_string()));
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = Error::synthesis(ProviderError::Provider("502".to_string()));
        assert_eq!(err.kind(), ErrorKind::Synthesis);
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_io_failure_is_internal() {
        let err = Error::from(std::io::Error::other("disk full"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.user_message(), "Something went wrong.");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_user_message_hides_detail() {
        let err = Error::Generation("upstream returned 500: stack trace".to_string());
        assert!(!err.user_message().contains("500"));
    }
}
