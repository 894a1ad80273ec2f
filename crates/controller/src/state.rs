//! Per-session state machine (§4.6).

/// One session's position in the utterance → assistant-turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Finalizing,
    Thinking,
    Speaking,
    Terminated,
}

impl SessionState {
    /// Partial transcripts are only meaningful while the user is still
    /// talking or STT is catching up (§4.6 invariant).
    pub fn accepts_partial_transcript(&self) -> bool {
        matches!(self, Self::Listening | Self::Finalizing)
    }

    /// AI response chunks only make sense once generation has started.
    pub fn accepts_ai_chunk(&self) -> bool {
        matches!(self, Self::Speaking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listening_and_finalizing_accept_partial_transcripts() {
        assert!(SessionState::Listening.accepts_partial_transcript());
        assert!(SessionState::Finalizing.accepts_partial_transcript());
        assert!(!SessionState::Idle.accepts_partial_transcript());
        assert!(!SessionState::Thinking.accepts_partial_transcript());
        assert!(!SessionState::Speaking.accepts_partial_transcript());
        assert!(!SessionState::Terminated.accepts_partial_transcript());
    }

    #[test]
    fn only_speaking_accepts_ai_chunks() {
        assert!(SessionState::Speaking.accepts_ai_chunk());
        assert!(!SessionState::Thinking.accepts_ai_chunk());
        assert!(!SessionState::Listening.accepts_ai_chunk());
    }
}
