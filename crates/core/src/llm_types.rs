//! Message/generation types shared between the LLM gateway and its
//! providers (§4.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Fully built context for one LLM turn (§4.4 "Context build").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

/// One fragment of a streaming LLM response (§4.4 "Streaming contract").
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub delta: String,
    pub is_final: bool,
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            is_final: false,
            finish_reason: None,
        }
    }

    pub fn done(finish_reason: FinishReason) -> Self {
        Self {
            delta: String::new(),
            is_final: true,
            finish_reason: Some(finish_reason),
        }
    }
}
