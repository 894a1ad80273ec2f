//! TTS Gateway (§4.5): synthesizes one sentence at a time per session,
//! in order, with per-sentence retry under a total time budget.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::{Stream, StreamExt};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use voxbridge_config::TtsConfig;
use voxbridge_core::traits::{TextToSpeech, TtsMetadata};

use crate::provider::HttpTtsProvider;

/// Emitted in order for one sentence: `Start`, zero or more `Chunk`, then
/// exactly one of `Complete` or `Failed`.
#[derive(Debug, Clone)]
pub enum TtsEvent {
    Start { index: usize },
    Chunk { index: usize, bytes: Vec<u8> },
    Complete { index: usize, metadata: TtsMetadata },
    Failed { index: usize, message: String },
}

pub struct TtsGateway {
    provider: Arc<dyn TextToSpeech>,
    retry_attempts: u32,
    per_sentence_timeout: Duration,
    session_locks: DashMap<Uuid, Arc<AsyncMutex<()>>>,
}

impl TtsGateway {
    pub fn new(config: &TtsConfig, per_sentence_timeout: Duration) -> Self {
        Self {
            provider: Arc::new(HttpTtsProvider::new(config)),
            retry_attempts: config.retry_attempts.max(1),
            per_sentence_timeout,
            session_locks: DashMap::new(),
        }
    }

    /// Drops the per-session serialization lock. Call once a session ends
    /// so the lock table doesn't grow unbounded over the server's lifetime.
    pub fn release_session(&self, session_id: Uuid) {
        self.session_locks.remove(&session_id);
    }

    /// Synthesizes one sentence for `session_id`. Serialized against any
    /// other in-flight call for the same session: the returned stream
    /// holds the session's lock for its whole lifetime, so the caller
    /// gets the "at most one sentence in flight per session" guarantee
    /// even if it (incorrectly) invokes this concurrently.
    pub fn synthesize_sentence<'a>(
        &'a self,
        session_id: Uuid,
        index: usize,
        text: String,
        voice: Option<String>,
        rate: f32,
        pitch: f32,
    ) -> Pin<Box<dyn Stream<Item = TtsEvent> + Send + 'a>> {
        let lock = self
            .session_locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();

        Box::pin(async_stream::stream! {
            let _guard = lock.lock().await;
            yield TtsEvent::Start { index };

            let deadline = Instant::now() + self.per_sentence_timeout;
            let mut attempt = 0u32;

            loop {
                attempt += 1;
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    tracing::warn!(session = %session_id, sentence = index, "tts synthesis exceeded total time budget");
                    yield TtsEvent::Failed { index, message: "tts timed out".to_string() };
                    return;
                }

                let attempt_result = tokio::time::timeout(
                    remaining,
                    self.provider.synthesize(&text, voice.as_deref(), rate, pitch),
                )
                .await;

                match attempt_result {
                    Ok(Ok((output, metadata))) => {
                        let mut chunks = output.chunks;
                        let mut stream_ok = true;
                        while let Some(chunk) = chunks.next().await {
                            match chunk {
                                Ok(bytes) => yield TtsEvent::Chunk { index, bytes },
                                Err(e) => {
                                    tracing::warn!(
                                        session = %session_id, sentence = index, attempt, error = %e,
                                        "tts chunk stream failed mid-sentence"
                                    );
                                    stream_ok = false;
                                    break;
                                }
                            }
                        }
                        if stream_ok {
                            yield TtsEvent::Complete { index, metadata };
                            return;
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(
                            session = %session_id, sentence = index, attempt, error = %e,
                            "tts synthesis attempt failed"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(session = %session_id, sentence = index, attempt, "tts synthesis attempt timed out");
                    }
                }

                if attempt >= self.retry_attempts {
                    tracing::error!(session = %session_id, sentence = index, attempts = attempt, "tts synthesis exhausted retries, dropping sentence");
                    yield TtsEvent::Failed {
                        index,
                        message: format!("tts synthesis failed after {attempt} attempts"),
                    };
                    return;
                }

                let backoff = Duration::from_millis(100u64 * 2u64.pow(attempt.min(6)));
                tokio::time::sleep(backoff.min(remaining)).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxbridge_config::TtsConfig;

    fn gateway() -> TtsGateway {
        TtsGateway::new(&TtsConfig::default(), Duration::from_secs(60))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn release_session_drops_the_lock_entry() {
        let gw = gateway();
        let session_id = Uuid::new_v4();
        gw.session_locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())));
        assert!(gw.session_locks.contains_key(&session_id));
        gw.release_session(session_id);
        assert!(!gw.session_locks.contains_key(&session_id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_connection_yields_start_then_failed() {
        let gw = TtsGateway::new(
            &TtsConfig {
                url: "http://127.0.0.1:1".to_string(),
                retry_attempts: 1,
                ..TtsConfig::default()
            },
            Duration::from_secs(5),
        );
        let session_id = Uuid::new_v4();
        let events: Vec<TtsEvent> = gw
            .synthesize_sentence(session_id, 0, "hello".to_string(), None, 1.0, 1.0)
            .collect()
            .await;

        assert!(matches!(events.first(), Some(TtsEvent::Start { index: 0 })));
        assert!(matches!(events.last(), Some(TtsEvent::Failed { index: 0, .. })));
    }
}
