//! Per-session STT connection: persistent WebSocket client with
//! reconnect/backoff and an inactivity health probe (§4.3).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

use voxbridge_config::SttConfig;

use crate::protocol::{AudioFormat, ControlMessage, SttMessage};

/// Events surfaced to the Session Controller. Partials/finals are
/// forwarded in the order STT sent them (§4.3 ordering guarantee).
#[derive(Debug, Clone)]
pub enum SttEvent {
    /// The WebSocket handshake and control message both completed.
    /// `elapsed_ms` is measured from the start of this connect attempt.
    Connected { elapsed_ms: u64 },
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
    /// Two consecutive failed health probes, or reconnect attempts
    /// exhausted: `STTUnavailable` (§4.3 step 5, §7).
    Unavailable,
}

/// Handle to a running per-session STT connection. Dropping it stops the
/// connection task.
pub struct SttHandle {
    audio_tx: mpsc::Sender<Vec<u8>>,
    _task: tokio::task::JoinHandle<()>,
}

impl SttHandle {
    /// Forward one binary audio payload. Non-blocking: if the connection
    /// is mid-reconnect the payload is queued in the channel buffer and
    /// flushed after the control message once reconnected.
    pub fn send_audio(&self, bytes: Vec<u8>) {
        if self.audio_tx.try_send(bytes).is_err() {
            tracing::warn!("stt audio queue full, dropping chunk");
        }
    }
}

pub fn spawn_stt_connection(
    session_id: Uuid,
    format: AudioFormat,
    cfg: SttConfig,
    events_tx: mpsc::Sender<SttEvent>,
) -> SttHandle {
    let (audio_tx, audio_rx) = mpsc::channel::<Vec<u8>>(512);
    let task = tokio::spawn(connection_loop(session_id, format, cfg, audio_rx, events_tx));
    SttHandle {
        audio_tx,
        _task: task,
    }
}

async fn connection_loop(
    session_id: Uuid,
    format: AudioFormat,
    cfg: SttConfig,
    mut audio_rx: mpsc::Receiver<Vec<u8>>,
    events_tx: mpsc::Sender<SttEvent>,
) {
    let mut attempt = 0u32;

    loop {
        let connect_started_at = Instant::now();
        match connect_async(&cfg.url).await {
            Ok((ws_stream, _response)) => {
                attempt = 0;
                tracing::info!(session_id = %session_id, url = %cfg.url, "stt connected");

                let (mut write, read) = ws_stream.split();

                let control = ControlMessage {
                    session_id,
                    format,
                    model: cfg.model.clone(),
                    language: cfg.language.clone(),
                };
                let control_json = match serde_json::to_string(&control) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize stt control message");
                        return;
                    }
                };
                if write.send(Message::Text(control_json)).await.is_err() {
                    continue_after_backoff(&mut attempt, &cfg, &events_tx).await;
                    continue;
                }

                let _ = events_tx
                    .send(SttEvent::Connected {
                        elapsed_ms: connect_started_at.elapsed().as_millis() as u64,
                    })
                    .await;

                let last_message_at = Arc::new(Mutex::new(Instant::now()));
                let consecutive_probe_failures = Arc::new(AtomicU32::new(0));

                let reader_events_tx = events_tx.clone();
                let reader_last_message_at = last_message_at.clone();
                let reader_probe_failures = consecutive_probe_failures.clone();
                let mut read = read;
                let reader_handle = tokio::spawn(async move {
                    while let Some(msg) = read.next().await {
                        match msg {
                            Ok(Message::Text(text)) => {
                                *reader_last_message_at.lock() = Instant::now();
                                reader_probe_failures.store(0, Ordering::SeqCst);
                                match serde_json::from_str::<SttMessage>(&text) {
                                    Ok(SttMessage::Partial {
                                        text,
                                        confidence,
                                        language,
                                    }) => {
                                        let _ = reader_events_tx
                                            .send(SttEvent::Partial {
                                                text,
                                                confidence,
                                                language,
                                            })
                                            .await;
                                    }
                                    Ok(SttMessage::Final {
                                        text,
                                        confidence,
                                        language,
                                    }) => {
                                        let _ = reader_events_tx
                                            .send(SttEvent::Final {
                                                text,
                                                confidence,
                                                language,
                                            })
                                            .await;
                                    }
                                    Ok(SttMessage::Silence) => {}
                                    Ok(SttMessage::Error { text }) => {
                                        tracing::warn!(error = %text, "stt reported error");
                                    }
                                    Err(e) => {
                                        tracing::warn!(error = %e, "failed to parse stt message");
                                    }
                                }
                            }
                            Ok(Message::Pong(_)) => {
                                *reader_last_message_at.lock() = Instant::now();
                                reader_probe_failures.store(0, Ordering::SeqCst);
                            }
                            Ok(Message::Close(_)) => break,
                            Err(_) => break,
                            _ => {}
                        }
                    }
                });

                let probe_interval_dur = Duration::from_secs(cfg.health_probe_interval_s);
                let mut probe_interval = tokio::time::interval(probe_interval_dur);

                let mut connection_lost = false;
                loop {
                    tokio::select! {
                        maybe_audio = audio_rx.recv() => {
                            match maybe_audio {
                                Some(bytes) => {
                                    if write.send(Message::Binary(bytes)).await.is_err() {
                                        connection_lost = true;
                                        break;
                                    }
                                }
                                None => {
                                    reader_handle.abort();
                                    return;
                                }
                            }
                        }
                        _ = probe_interval.tick() => {
                            let idle_for = Instant::now().duration_since(*last_message_at.lock());
                            if idle_for >= probe_interval_dur {
                                if write.send(Message::Ping(Vec::new())).await.is_err() {
                                    connection_lost = true;
                                    break;
                                }
                                let failures = consecutive_probe_failures.fetch_add(1, Ordering::SeqCst) + 1;
                                if failures >= 2 {
                                    tracing::warn!(session_id = %session_id, "stt health probe failed twice, marking unavailable");
                                    let _ = events_tx.send(SttEvent::Unavailable).await;
                                    connection_lost = true;
                                    break;
                                }
                            }
                        }
                    }
                }

                reader_handle.abort();
                if !connection_lost {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "stt connect failed");
            }
        }

        if !continue_after_backoff(&mut attempt, &cfg, &events_tx).await {
            return;
        }
    }
}

/// Exponential backoff up to `reconnect_attempts`; returns `false` once
/// exhausted (after surfacing `Unavailable`).
async fn continue_after_backoff(
    attempt: &mut u32,
    cfg: &SttConfig,
    events_tx: &mpsc::Sender<SttEvent>,
) -> bool {
    *attempt += 1;
    if *attempt > cfg.reconnect_attempts {
        let _ = events_tx.send(SttEvent::Unavailable).await;
        return false;
    }
    let delay_s = (cfg.reconnect_delay_s * 2u64.pow(attempt.saturating_sub(1)))
        .min(cfg.reconnect_delay_cap_s);
    tokio::time::sleep(Duration::from_secs(delay_s)).await;
    true
}
