//! Structured event protocol (§3 Event, §6 recognized server→client events).
//!
//! An [`Event`] is what the Session Controller emits; it is fanned out to
//! the owning session's client channel and, for the subset in
//! [`EventKind::is_observer_relevant`], to the global observer channel with
//! the user id attached (§4.6).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum EventKind {
    UtteranceStart,
    PartialTranscript { text: String },
    StopListening { reason: StopReason },
    FinalTranscript { text: String },
    AiResponseStart,
    AiResponseChunk { text: String },
    AiResponseComplete { text: String },
    TtsStart { sentence_index: usize, text: String },
    TtsComplete { sentence_index: usize },
    MessageSaved { turn_id: u64, role: crate::model::TurnRole },
    MetricsUpdated(Box<crate::metrics::SessionMetricsSnapshot>),
    ServiceError { source: String, message: String, recoverable: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    Silence { silence_ms: u64 },
    MaxUtterance { elapsed_ms: u64 },
}

impl EventKind {
    /// Observer-forwarded set (§4.6 "Event bus"): events meaningful for
    /// conversation history.
    pub fn is_observer_relevant(&self) -> bool {
        matches!(
            self,
            EventKind::PartialTranscript { .. }
                | EventKind::FinalTranscript { .. }
                | EventKind::AiResponseChunk { .. }
                | EventKind::AiResponseComplete { .. }
                | EventKind::MessageSaved { .. }
                | EventKind::MetricsUpdated(_)
        )
    }
}

/// A fully addressed event, ready to be serialized onto the session or
/// observer channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub session_id: Uuid,
    /// Present on observer copies; omitted (but always known) on the
    /// session channel, where the client already knows its own user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub correlation_id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(session_id: Uuid, correlation_id: Uuid, kind: EventKind) -> Self {
        Self {
            session_id,
            user_id: None,
            correlation_id,
            timestamp: chrono::Utc::now(),
            kind,
        }
    }

    /// Clone this event as an observer copy, stamping the user id (§3
    /// invariant: observer copies carry an identical payload plus user id).
    pub fn for_observer(&self, user_id: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.user_id = Some(user_id.into());
        copy
    }
}
