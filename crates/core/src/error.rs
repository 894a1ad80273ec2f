//! Error taxonomy shared by every VoxBridge component.
//!
//! Mirrors the kinds in the session pipeline spec: each variant says what
//! is fatal for (connection, turn, utterance, session) rather than just
//! carrying a message, so callers in `controller` can match on kind to
//! decide state-machine transitions.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session owned by a different user")]
    OwnershipMismatch,

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("audio decode error: {0}")]
    AudioDecodeError(String),

    #[error("STT backend unavailable: {0}")]
    SttUnavailable(String),

    #[error("STT reconnecting")]
    SttReconnecting,

    #[error("STT timed out")]
    SttTimeout,

    #[error("LLM request timed out")]
    LlmTimeout,

    #[error("LLM backend unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM authentication failed: {0}")]
    LlmAuthError(String),

    #[error("LLM rate limit exceeded")]
    LlmRateLimit,

    #[error("TTS failed for sentence {index}: {message}")]
    TtsFailure { index: usize, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is fatal for the whole connection (session-ending)
    /// as opposed to merely the current turn/utterance (§7 propagation policy).
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Error::SessionNotFound(_) | Error::OwnershipMismatch | Error::AgentNotFound(_)
        )
    }

    /// `source` tag used in the `service_error` event payload (§6).
    pub fn source_tag(&self) -> &'static str {
        match self {
            Error::SessionNotFound(_) | Error::OwnershipMismatch | Error::AgentNotFound(_) => {
                "session"
            }
            Error::StoreUnavailable(_) => "store",
            Error::AudioDecodeError(_) => "audio",
            Error::SttUnavailable(_) | Error::SttReconnecting | Error::SttTimeout => "stt",
            Error::LlmTimeout
            | Error::LlmUnavailable(_)
            | Error::LlmAuthError(_)
            | Error::LlmRateLimit => "llm",
            Error::TtsFailure { .. } => "tts",
            Error::Configuration(_) => "config",
            Error::Transport(_) => "transport",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether the session indicator should return to `idle` after this
    /// error rather than terminating the connection.
    pub fn recoverable(&self) -> bool {
        !self.is_connection_fatal()
    }
}
