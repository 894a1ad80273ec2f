//! Per-session ingestion pipeline: buffer, decode, and utterance-boundary
//! detection wired together (§4.2).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::buffer::ContainerBuffer;
use crate::decode::{decode_container_chunk, DecodeOutcome};

/// Reason an utterance was considered finished.
#[derive(Debug, Clone, Copy)]
pub enum UtteranceEndReason {
    Silence { silence_ms: u64 },
    MaxUtterance { elapsed_ms: u64 },
}

/// Events the ingestion pipeline raises for its owning session. The
/// receiver knows which session these belong to by which channel they
/// arrived on, so handlers never need to capture a session id in a
/// closure (see the stale-closure note on event handler design).
#[derive(Debug)]
pub enum IngestionEvent {
    UtteranceStart,
    Pcm(Vec<u8>),
    UtteranceEnd(UtteranceEndReason),
}

#[derive(Debug, Clone, Copy)]
pub struct IngestionTuning {
    pub silence_threshold: Duration,
    pub max_utterance: Duration,
    pub monitor_interval: Duration,
    pub buffer_max_bytes: usize,
    pub buffer_min_parse_bytes: usize,
}

impl From<&voxbridge_config::IngestionConfig> for IngestionTuning {
    fn from(cfg: &voxbridge_config::IngestionConfig) -> Self {
        Self {
            silence_threshold: Duration::from_millis(cfg.silence_threshold_ms),
            max_utterance: Duration::from_millis(cfg.max_utterance_time_ms),
            monitor_interval: Duration::from_millis(cfg.monitor_interval_ms),
            buffer_max_bytes: cfg.container_buffer_max_bytes,
            buffer_min_parse_bytes: cfg.container_buffer_min_parse_bytes,
        }
    }
}

/// Owns one session's container buffer and silence/max-utterance monitor.
pub struct IngestionSession {
    buffer: ContainerBuffer,
    tuning: IngestionTuning,
    events_tx: mpsc::Sender<IngestionEvent>,
    last_audio_at: Arc<Mutex<Instant>>,
    utterance_start_at: Option<Instant>,
    monitor_ended: Arc<AtomicBool>,
    monitor_handle: Option<JoinHandle<()>>,
}

impl IngestionSession {
    pub fn new(tuning: IngestionTuning, events_tx: mpsc::Sender<IngestionEvent>) -> Self {
        Self {
            buffer: ContainerBuffer::new(tuning.buffer_max_bytes, tuning.buffer_min_parse_bytes),
            tuning,
            events_tx,
            last_audio_at: Arc::new(Mutex::new(Instant::now())),
            utterance_start_at: None,
            monitor_ended: Arc::new(AtomicBool::new(true)),
            monitor_handle: None,
        }
    }

    /// Push a new chunk of container-framed audio bytes for this session.
    ///
    /// The last-audio timestamp is updated unconditionally, even when no
    /// PCM can be extracted from this push, so the silence timer can
    /// never fire while data is merely still buffering (§4.2, property 5).
    pub async fn push_audio(&mut self, bytes: &[u8]) {
        let now = Instant::now();
        *self.last_audio_at.lock() = now;

        if self.utterance_start_at.is_none() {
            self.utterance_start_at = Some(now);
            self.spawn_monitor(now);
            let _ = self.events_tx.send(IngestionEvent::UtteranceStart).await;
        }

        self.buffer.push(bytes);
        if !self.buffer.ready_to_parse() {
            return;
        }

        match decode_container_chunk(self.buffer.as_slice()) {
            DecodeOutcome::Decoded(pcm) => {
                self.buffer.clear();
                if !pcm.is_empty() {
                    let _ = self.events_tx.send(IngestionEvent::Pcm(pcm)).await;
                }
            }
            DecodeOutcome::Incomplete => {
                // Wait for more bytes; buffer is left intact.
            }
            DecodeOutcome::Corrupt => {
                tracing::warn!("dropping unparseable container buffer");
                self.buffer.clear();
            }
        }
    }

    /// Acknowledge that the current utterance has been fully handed off
    /// (STT final received, or the session was told to stop listening by
    /// another means) and reset for the next one.
    pub fn reset_utterance(&mut self) {
        self.utterance_start_at = None;
        self.monitor_ended.store(true, Ordering::SeqCst);
        if let Some(handle) = self.monitor_handle.take() {
            handle.abort();
        }
        self.buffer.clear();
    }

    fn spawn_monitor(&mut self, utterance_start_at: Instant) {
        if let Some(handle) = self.monitor_handle.take() {
            handle.abort();
        }
        self.monitor_ended.store(false, Ordering::SeqCst);

        let last_audio_at = self.last_audio_at.clone();
        let ended = self.monitor_ended.clone();
        let events_tx = self.events_tx.clone();
        let tuning = self.tuning;

        self.monitor_handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tuning.monitor_interval);
            loop {
                interval.tick().await;
                if ended.load(Ordering::SeqCst) {
                    break;
                }

                let now = Instant::now();
                let silence_elapsed = now.duration_since(*last_audio_at.lock());
                if silence_elapsed >= tuning.silence_threshold {
                    ended.store(true, Ordering::SeqCst);
                    let _ = events_tx
                        .send(IngestionEvent::UtteranceEnd(UtteranceEndReason::Silence {
                            silence_ms: silence_elapsed.as_millis() as u64,
                        }))
                        .await;
                    break;
                }

                let total_elapsed = now.duration_since(utterance_start_at);
                if total_elapsed >= tuning.max_utterance {
                    ended.store(true, Ordering::SeqCst);
                    let _ = events_tx
                        .send(IngestionEvent::UtteranceEnd(UtteranceEndReason::MaxUtterance {
                            elapsed_ms: total_elapsed.as_millis() as u64,
                        }))
                        .await;
                    break;
                }
            }
        }));
    }
}

impl Drop for IngestionSession {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> IngestionTuning {
        IngestionTuning {
            silence_threshold: Duration::from_millis(50),
            max_utterance: Duration::from_secs(5),
            monitor_interval: Duration::from_millis(10),
            buffer_max_bytes: 1024,
            buffer_min_parse_bytes: 0,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn silence_fires_utterance_end_after_threshold() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut session = IngestionSession::new(tuning(), tx);

        session.push_audio(&[0u8; 4]).await;
        assert!(matches!(rx.recv().await, Some(IngestionEvent::UtteranceStart)));

        let end = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("monitor should fire")
            .expect("channel open");
        assert!(matches!(
            end,
            IngestionEvent::UtteranceEnd(UtteranceEndReason::Silence { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_pushes_without_pcm_delay_silence_detection() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut session = IngestionSession::new(tuning(), tx);

        session.push_audio(&[]).await;
        assert!(matches!(rx.recv().await, Some(IngestionEvent::UtteranceStart)));

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            session.push_audio(&[]).await;
        }

        let end = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("monitor should eventually fire")
            .expect("channel open");
        assert!(matches!(
            end,
            IngestionEvent::UtteranceEnd(UtteranceEndReason::Silence { .. })
        ));
    }
}
