//! Error types for the ARIA assistant

use thiserror::Error;

/// Result type alias for ARIA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The speech recognition collaborator cannot produce fragments
    #[error("speech recognition unavailable: {0}")]
    RecognitionUnavailable(String),

    /// No command was finalized within the capture window
    #[error("command capture timed out")]
    CaptureTimeout,

    /// The completion service could not be reached or did not answer in time
    #[error("completion service unreachable: {0}")]
    ServiceUnreachable(String),

    /// The completion service rejected the call for quota or rate reasons
    #[error("completion service quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The completion service answered with something we cannot use
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    /// Speech synthesis failed or no engine is available
    #[error("speech synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    /// The I/O adapter's input or output stream is gone
    #[error("adapter closed: {0}")]
    AdapterClosed(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error ends the session it occurred in
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RecognitionUnavailable(_) | Self::AdapterClosed(_)
        )
    }

    /// Whether this error is a completion service failure that the
    /// dialogue engine turns into an apology reply
    #[must_use]
    pub const fn is_service_failure(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnreachable(_) | Self::QuotaExceeded(_) | Self::MalformedResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_recognition_and_adapter() {
        assert!(Error::AdapterClosed("eof".into()).is_fatal());
        assert!(Error::RecognitionUnavailable("down".into()).is_fatal());
        assert!(!Error::ServiceUnreachable("timeout".into()).is_fatal());
        assert!(!Error::CaptureTimeout.is_fatal());
        assert!(!Error::SynthesisUnavailable("none".into()).is_fatal());
    }

    #[test]
    fn service_failures_classified() {
        assert!(Error::QuotaExceeded("429".into()).is_service_failure());
        assert!(Error::MalformedResponse("no text".into()).is_service_failure());
        assert!(!Error::AdapterClosed("eof".into()).is_service_failure());
    }
}
