//! Pluggable-backend traits. Concrete adapters live in `voxbridge-llm`,
//! `voxbridge-tts`, and `voxbridge-store`; this crate only defines the seam.

use crate::error::Result;
use crate::llm_types::{GenerateRequest, StreamChunk};
use crate::model::{Agent, Session, Turn};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

/// One LLM backend (cloud / local / webhook). Implemented per-provider in
/// `voxbridge-llm`; the gateway is generic over `Arc<dyn LanguageModel>`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Stream fragments in emission order. The stream's last item carries
    /// `is_final = true` and the finish reason (§4.4 streaming contract).
    fn generate_stream<'a>(
        &'a self,
        request: GenerateRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>>;

    fn provider_name(&self) -> &str;
}

/// TTS output for one sentence: a stream of binary audio chunks plus a
/// final metadata record (§4.5).
pub struct TtsOutput {
    pub chunks: Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>,
}

#[derive(Debug, Clone, Copy)]
pub struct TtsMetadata {
    pub duration_ms: u64,
    pub sample_rate: u32,
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize one sentence. Returns a chunk stream; the caller drains
    /// it fully before the synthesis is considered complete so that the
    /// per-session "one sentence at a time" ordering guarantee holds.
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        rate: f32,
        pitch: f32,
    ) -> Result<(TtsOutput, TtsMetadata)>;
}

/// External persistent-state interface (§6 "Persistent state layout").
/// Treated as an out-of-scope collaborator: this crate defines only the
/// contract the core pipeline depends on.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_agent(&self, agent_id: Uuid) -> Result<Agent>;
    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>>;
    async fn create_session(&self, session: &Session) -> Result<()>;
    async fn mark_session_inactive(&self, session_id: Uuid) -> Result<()>;
    async fn append_turn(&self, session_id: Uuid, turn: &Turn) -> Result<()>;
    async fn list_recent_turns(&self, session_id: Uuid, limit: usize) -> Result<Vec<Turn>>;
}
