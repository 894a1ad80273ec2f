//! LLM Gateway: selects a provider per agent, streams its response through
//! the sentence extractor, and enforces the per-turn and per-fragment
//! timeouts, falling back to the webhook provider once if the primary
//! provider fails before any fragment is produced (§4.4).

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};

use voxbridge_config::LlmConfig;
use voxbridge_core::traits::LanguageModel;
use voxbridge_core::llm_types::GenerateRequest;
use voxbridge_core::{Agent, Error, Result, Turn};

use crate::context::build_messages;
use crate::provider::HttpLlmProvider;
use crate::sentence::SentenceExtractor;

/// One unit of progress from a turn's generation.
#[derive(Debug, Clone)]
pub enum LlmEvent {
    /// A raw incremental piece of text exactly as the provider streamed
    /// it, before sentence extraction. Concatenating every `Delta` for a
    /// cycle reproduces `Final::text` exactly (§8 property 4).
    Delta(String),
    /// A complete sentence, ready for TTS.
    Fragment(String),
    /// The full accumulated response text, emitted once, last.
    Final { text: String },
}

pub struct LlmGateway {
    cloud: Arc<dyn LanguageModel>,
    local: Arc<dyn LanguageModel>,
    webhook: Arc<dyn LanguageModel>,
    config: LlmConfig,
}

impl LlmGateway {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            cloud: Arc::new(HttpLlmProvider::new("cloud", &config.cloud)),
            local: Arc::new(HttpLlmProvider::new("local", &config.local)),
            webhook: Arc::new(HttpLlmProvider::new("webhook", &config.webhook)),
            config,
        }
    }

    fn select(&self, agent: &Agent) -> Arc<dyn LanguageModel> {
        if agent.llm.use_webhook {
            return self.webhook.clone();
        }
        match agent.llm.provider {
            voxbridge_core::LlmProviderTag::Cloud => self.cloud.clone(),
            voxbridge_core::LlmProviderTag::Local => self.local.clone(),
            voxbridge_core::LlmProviderTag::Webhook => self.webhook.clone(),
        }
    }

    /// Streams a turn's generation as a sequence of sentence fragments
    /// followed by one `Final` event carrying the full text.
    ///
    /// A failure from the primary provider before any fragment has been
    /// produced triggers one fallback attempt against the webhook
    /// provider, re-building the full context rather than just resending
    /// the final user text. A failure after fragments have already been
    /// emitted is surfaced as-is: that partial text is the caller's to
    /// commit, not ours to retry.
    pub fn generate<'a>(
        &'a self,
        agent: &'a Agent,
        context: &'a [Turn],
        user_text: &'a str,
    ) -> Pin<Box<dyn Stream<Item = Result<LlmEvent>> + Send + 'a>> {
        Box::pin(async_stream::try_stream! {
            let messages = build_messages(agent, context, user_text);
            let request = GenerateRequest {
                messages,
                temperature: agent.llm.temperature,
                max_tokens: None,
            };

            let primary = self.select(agent);
            let deadline = Instant::now() + Duration::from_secs(self.config.timeout_s);
            let quiet_period = Duration::from_secs(self.config.fragment_quiet_period_s);

            let mut extractor = SentenceExtractor::new(
                self.config.min_sentence_length,
                self.config.use_clause_splitting,
            );
            let mut accumulated = String::new();
            let mut stream = primary.generate_stream(request.clone());
            let mut emitted_any = false;
            let mut attempted_fallback = false;

            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    Err(Error::LlmTimeout)?;
                }
                let wait = remaining.min(quiet_period);

                let item = match tokio::time::timeout(wait, stream.next()).await {
                    Ok(item) => item,
                    Err(_) => Err(Error::LlmTimeout)?,
                };

                match item {
                    None => break,
                    Some(Ok(chunk)) => {
                        emitted_any = true;
                        if !chunk.delta.is_empty() {
                            accumulated.push_str(&chunk.delta);
                            yield LlmEvent::Delta(chunk.delta.clone());
                            for sentence in extractor.push(&chunk.delta) {
                                yield LlmEvent::Fragment(sentence);
                            }
                        }
                        if chunk.is_final {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        if !emitted_any
                            && !attempted_fallback
                            && self.config.fallback_enabled
                            && primary.provider_name() != "webhook"
                        {
                            attempted_fallback = true;
                            tracing::warn!(
                                error = %e,
                                "llm primary provider failed before first fragment, falling back to webhook"
                            );
                            stream = self.webhook.generate_stream(request.clone());
                            continue;
                        }
                        Err(e)?;
                    }
                }
            }

            if let Some(trailing) = extractor.flush() {
                yield LlmEvent::Fragment(trailing);
            }
            yield LlmEvent::Final { text: accumulated };
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_webhook_when_use_webhook_is_set() {
        let gateway = LlmGateway::new(LlmConfig::default());
        let mut agent = test_agent();
        agent.llm.use_webhook = true;
        assert_eq!(gateway.select(&agent).provider_name(), "webhook");
    }

    #[test]
    fn selects_configured_provider_otherwise() {
        let gateway = LlmGateway::new(LlmConfig::default());
        let agent = test_agent();
        assert_eq!(gateway.select(&agent).provider_name(), "cloud");
    }

    fn test_agent() -> Agent {
        Agent {
            id: uuid::Uuid::new_v4(),
            name: "a".to_string(),
            llm: voxbridge_core::LlmAgentConfig {
                provider: voxbridge_core::LlmProviderTag::Cloud,
                model: "m".to_string(),
                temperature: 0.7,
                system_prompt: None,
                use_webhook: false,
            },
            tts: voxbridge_core::TtsAgentConfig::default(),
            plugins: Default::default(),
        }
    }
}
