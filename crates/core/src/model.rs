//! Data model: Agent, Session, Turn, Utterance (§3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Which LLM provider a turn should route to, per agent configuration (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderTag {
    Cloud,
    Local,
    Webhook,
}

/// Channel a session originated from (§3 Provenance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Web,
    Discord,
    Plugin(String),
}

/// Sensitive plugin-config values are stored as this marker plus a base64
/// payload; the core never decrypts or logs past the marker (§9).
pub const ENCRYPTED_MARKER_PREFIX: &str = "__encrypted__:";

pub fn is_encrypted_marker(value: &str) -> bool {
    value.starts_with(ENCRYPTED_MARKER_PREFIX)
}

/// LLM configuration half of an Agent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAgentConfig {
    pub provider: LlmProviderTag,
    pub model: String,
    /// Clamped to [0, 2] by `AgentConfigBuilder`/store deserialization.
    pub temperature: f32,
    pub system_prompt: Option<String>,
    /// Forces routing to the webhook provider regardless of `provider`.
    pub use_webhook: bool,
}

/// TTS configuration half of an Agent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsAgentConfig {
    pub voice: Option<String>,
    /// Clamped to [0.5, 2.0], default 1.0.
    pub rate: f32,
    /// Clamped to [0.5, 2.0], default 1.0.
    pub pitch: f32,
}

impl Default for TtsAgentConfig {
    fn default() -> Self {
        Self {
            voice: None,
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

/// Persistent configuration for a conversational persona (§3 Agent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub llm: LlmAgentConfig,
    pub tts: TtsAgentConfig,
    /// Opaque plugin-name -> plugin-config map. Values may contain
    /// `__encrypted__:<base64>` markers that the core never inspects.
    pub plugins: HashMap<String, serde_json::Value>,
}

/// A single active conversation with one agent (§3 Session).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub agent_id: Uuid,
    pub channel: ChannelType,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_activity: chrono::DateTime<chrono::Utc>,
    pub active: bool,
}

impl Session {
    pub fn new(id: Uuid, user_id: impl Into<String>, agent_id: Uuid, channel: ChannelType) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            user_id: user_id.into(),
            agent_id,
            channel,
            created_at: now,
            last_activity: now,
            active: true,
        }
    }
}

/// Role of a turn (§3 Turn).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// Per-stage latency samples attached to a turn, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageLatencies {
    pub stt_ms: Option<u64>,
    pub llm_ms: Option<u64>,
    pub tts_ms: Option<u64>,
}

/// One request/response half-pair belonging to a session (§3 Turn).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Monotonic, scoped per session.
    pub id: u64,
    pub role: TurnRole,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub latencies: StageLatencies,
}

impl Turn {
    pub fn new(id: u64, role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            timestamp: chrono::Utc::now(),
            latencies: StageLatencies::default(),
        }
    }
}
