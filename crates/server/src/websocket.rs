//! WebSocket Handler (§6 "Client-facing transport"): one bidirectional
//! stream per session carrying binary audio both ways and JSON control
//! frames shaped `{event, data}`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use uuid::Uuid;

use voxbridge_core::ChannelType;
use voxbridge_stt::AudioFormat;

use crate::rate_limit::RateLimiter;
use crate::state::AppState;
use crate::ServerError;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub session_id: Option<Uuid>,
    pub user_id: String,
    pub agent_id: Option<Uuid>,
    pub channel: Option<String>,
    pub format: Option<String>,
}

fn parse_channel(raw: Option<&str>) -> ChannelType {
    match raw {
        None | Some("web") => ChannelType::Web,
        Some("discord") => ChannelType::Discord,
        Some(other) => ChannelType::Plugin(other.to_string()),
    }
}

fn parse_format(raw: Option<&str>) -> AudioFormat {
    match raw {
        Some("opus") => AudioFormat::Opus,
        _ => AudioFormat::Pcm,
    }
}

/// Control frame shape (§6): `{event: <name>, data: {...}}`.
#[derive(Debug, Deserialize)]
struct ControlFrame {
    event: String,
    #[serde(default)]
    #[allow(dead_code)]
    data: serde_json::Value,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> Result<Response, ServerError> {
    let agent_id = match (params.session_id, params.agent_id) {
        (Some(_), _) => Uuid::nil(), // resolved from the existing session below
        (None, Some(agent_id)) => agent_id,
        (None, None) => {
            return Err(ServerError::InvalidRequest(
                "agent_id is required when session_id is not given".to_string(),
            ))
        }
    };
    let channel = parse_channel(params.channel.as_deref());

    let handle = state
        .sessions
        .get_or_create(params.session_id, &params.user_id, agent_id, channel)
        .await
        .map_err(|e| ServerError::Session(e.to_string()))?;
    let session_id = handle.session.id;
    let format = parse_format(params.format.as_deref());

    let rate_limit_config = state.config.read().server.rate_limit.clone();
    let rate_limiter = RateLimiter::new(rate_limit_config);

    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, state, session_id, params.user_id, format, rate_limiter)
    }))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    session_id: Uuid,
    user_id: String,
    format: AudioFormat,
    rate_limiter: RateLimiter,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: Arc<AsyncMutex<SplitSink<WebSocket, Message>>> = Arc::new(AsyncMutex::new(ws_sender));
    let rate_limiter = Arc::new(AsyncMutex::new(rate_limiter));

    let config = state.config.read();
    let ingestion_tuning = voxbridge_ingestion::IngestionTuning::from(&config.ingestion);
    let stt_config = config.stt.clone();
    drop(config);

    let context = state
        .sessions
        .get_context(session_id, usize::MAX)
        .await
        .unwrap_or_default();
    let next_turn_id = context.last().map(|t| t.id + 1).unwrap_or(0);

    let interrupt = Arc::new(Notify::new());

    let voxbridge_controller::ControllerHandles { audio_tx, mut frame_rx } = voxbridge_controller::spawn(
        session_id,
        user_id,
        format,
        ingestion_tuning,
        stt_config,
        state.llm.clone(),
        state.tts.clone(),
        state.sessions.clone(),
        state.observer_tx.clone(),
        interrupt.clone(),
        next_turn_id,
    );

    let writer_sender = ws_sender.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let message = match frame {
                voxbridge_controller::ClientFrame::Event(event) => match serde_json::to_string(&event) {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize outbound event");
                        continue;
                    }
                },
                voxbridge_controller::ClientFrame::Binary(bytes) => Message::Binary(bytes),
            };
            // Sending the last audio chunk and `tts_complete` on the same
            // awaited sink, in emission order, is what makes the latter
            // always observed after the former (§4.5, §9) — no timer needed.
            if writer_sender.lock().await.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                let allowed = rate_limiter.lock().await.check_audio(data.len());
                if let Err(e) = allowed {
                    send_rate_limit_error(&ws_sender, &e).await;
                    continue;
                }
                if audio_tx.send(data).await.is_err() {
                    break;
                }
            }
            Ok(Message::Text(text)) => {
                if let Err(e) = rate_limiter.lock().await.check_message() {
                    send_rate_limit_error(&ws_sender, &e).await;
                    continue;
                }
                match serde_json::from_str::<ControlFrame>(&text) {
                    Ok(frame) => match frame.event.as_str() {
                        "interrupt" => interrupt.notify_one(),
                        "set_format" => {
                            // The STT connection's format is fixed for the
                            // connection's lifetime (its control message is
                            // sent once, see voxbridge_stt::client); a
                            // mid-stream change would need a new connection,
                            // out of scope here.
                            tracing::debug!(session_id = %session_id, "ignoring set_format after connect");
                        }
                        other => tracing::debug!(event = other, "unrecognized control event"),
                    },
                    Err(e) => tracing::warn!(error = %e, "failed to parse control frame"),
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = ws_sender.lock().await.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {}
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "websocket error");
                break;
            }
        }
    }

    writer_task.abort();
    tracing::info!(session_id = %session_id, "websocket closed");
}

async fn send_rate_limit_error(
    sender: &Arc<AsyncMutex<SplitSink<WebSocket, Message>>>,
    error: &crate::rate_limit::RateLimitError,
) {
    let payload = serde_json::json!({ "event": "service_error", "data": { "source": "transport", "message": error.to_string(), "recoverable": true } });
    let _ = sender
        .lock()
        .await
        .send(Message::Text(payload.to_string()))
        .await;
}
