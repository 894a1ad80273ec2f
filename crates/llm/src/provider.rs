//! HTTP-backed `LanguageModel`: speaks an OpenAI-chat-compatible wire
//! format against whichever endpoint a provider slot (cloud/local/webhook)
//! points at (§4.4).

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use voxbridge_config::LlmProviderConfig;
use voxbridge_core::traits::LanguageModel;
use voxbridge_core::llm_types::{FinishReason, GenerateRequest, Message, Role};
use voxbridge_core::{Error, Result, StreamChunk};

pub struct HttpLlmProvider {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpLlmProvider {
    pub fn new(name: impl Into<String>, cfg: &LlmProviderConfig) -> Self {
        Self {
            name: name.into(),
            client: Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&Message> for ChatMessage {
    fn from(m: &Message) -> Self {
        let role = match m.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: m.content.clone(),
        }
    }
}

#[derive(Deserialize)]
struct StreamEnvelope {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

fn map_status(status: reqwest::StatusCode, body: String) -> Error {
    match status.as_u16() {
        401 | 403 => Error::LlmAuthError(body),
        429 => Error::LlmRateLimit,
        _ => Error::LlmUnavailable(format!("HTTP {status}: {body}")),
    }
}

#[async_trait]
impl LanguageModel for HttpLlmProvider {
    fn generate_stream<'a>(
        &'a self,
        request: GenerateRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
        Box::pin(async_stream::stream! {
            let body = ChatRequest {
                model: self.model.clone(),
                messages: request.messages.iter().map(ChatMessage::from).collect(),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                stream: true,
            };

            let mut req = self.client.post(self.chat_url()).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let response = match req.send().await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(Error::LlmUnavailable(e.to_string()));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                yield Err(map_status(status, body));
                return;
            }

            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(Error::LlmUnavailable(e.to_string()));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line == "data: [DONE]" {
                        continue;
                    }
                    let Some(json_str) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let Ok(envelope) = serde_json::from_str::<StreamEnvelope>(json_str) else {
                        continue;
                    };
                    let Some(choice) = envelope.choices.into_iter().next() else {
                        continue;
                    };

                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            yield Ok(StreamChunk::text(content));
                        }
                    }
                    if let Some(reason) = choice.finish_reason {
                        let finish = match reason.as_str() {
                            "length" => FinishReason::Length,
                            "stop" => FinishReason::Stop,
                            _ => FinishReason::Stop,
                        };
                        yield Ok(StreamChunk::done(finish));
                        return;
                    }
                }
            }

            yield Ok(StreamChunk::done(FinishReason::Stop));
        })
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
