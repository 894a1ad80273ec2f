//! Wire shapes exchanged with the external STT engine (§4.3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audio format announced once per connection, immutable for its
/// lifetime. `Opus` carries raw Opus frames from voice-channel plugins;
/// `Pcm` carries the interleaved PCM16 the Audio Ingestion component
/// produces for browser clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Opus,
    Pcm,
}

/// First message sent on every (re)connection, before any binary audio.
#[derive(Debug, Clone, Serialize)]
pub struct ControlMessage {
    pub session_id: Uuid,
    pub format: AudioFormat,
    pub model: String,
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SttMessage {
    Partial {
        text: String,
        confidence: Option<f32>,
        language: Option<String>,
    },
    Final {
        text: String,
        confidence: Option<f32>,
        language: Option<String>,
    },
    Silence,
    Error {
        text: String,
    },
}
