//! Shared types and traits for the VoxBridge real-time voice pipeline.
//!
//! This crate carries no I/O of its own: it defines the data model, the
//! event protocol, the error taxonomy, and the seam traits that
//! `voxbridge-llm`, `voxbridge-tts`, and `voxbridge-store` implement against.
//! Every other crate in the workspace depends on this one.

pub mod error;
pub mod events;
pub mod llm_types;
pub mod metrics;
pub mod model;
pub mod traits;

pub use error::{Error, Result};
pub use events::{Event, EventKind, StopReason};
pub use llm_types::{FinishReason, GenerateRequest, Message, Role, StreamChunk};
pub use metrics::{LatencyAggregate, SessionMetricsSnapshot};
pub use model::{
    is_encrypted_marker, Agent, ChannelType, LlmAgentConfig, LlmProviderTag, Session,
    StageLatencies, TtsAgentConfig, Turn, TurnRole, ENCRYPTED_MARKER_PREFIX,
};
pub use traits::{LanguageModel, Store, TextToSpeech, TtsMetadata, TtsOutput};
