//! Session Controller (§4.6): owns one session's state machine, wires the
//! ingestion, STT, LLM and TTS stages together, and drives each assistant
//! turn.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{broadcast, mpsc, Notify};
use uuid::Uuid;

use voxbridge_config::SttConfig;
use voxbridge_core::{Agent, Error, Event, EventKind, StopReason, Turn, TurnRole};
use voxbridge_ingestion::{IngestionEvent, IngestionSession, IngestionTuning, UtteranceEndReason};
use voxbridge_llm::{LlmEvent, LlmGateway};
use voxbridge_session::SessionManager;
use voxbridge_stt::{spawn_stt_connection, AudioFormat, SttEvent, SttHandle};
use voxbridge_tts::{TtsEvent, TtsGateway};

use crate::bus::EventBus;
use crate::frame::ClientFrame;
use crate::metrics::MetricsRecorder;
use crate::state::SessionState;

/// Channel handles a transport layer needs to drive one controller:
/// `audio_tx` for raw inbound audio, `frame_rx` to drain in emission order.
pub struct ControllerHandles {
    pub audio_tx: mpsc::Sender<Vec<u8>>,
    pub frame_rx: mpsc::Receiver<ClientFrame>,
}

/// One session's pipeline orchestration. Runs as a single task; all its
/// state is exclusively owned and never shared, so every handler below
/// takes `&mut self` with no internal locking.
pub struct SessionController {
    session_id: Uuid,
    state: SessionState,
    correlation_id: Uuid,
    bus: EventBus,
    session_manager: Arc<SessionManager>,
    llm: Arc<LlmGateway>,
    tts: Arc<TtsGateway>,
    ingestion: IngestionSession,
    ingestion_rx: mpsc::Receiver<IngestionEvent>,
    stt_handle: SttHandle,
    stt_rx: mpsc::Receiver<SttEvent>,
    audio_rx: mpsc::Receiver<Vec<u8>>,
    interrupt: Arc<Notify>,
    next_turn_id: u64,
    metrics: MetricsRecorder,
    utterance_started_at: Option<Instant>,
    first_partial_at: Option<Instant>,
}

/// Spawns a controller task for one session and returns the channels a
/// transport layer uses to feed it audio and drain its output.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    session_id: Uuid,
    user_id: String,
    format: AudioFormat,
    ingestion_tuning: IngestionTuning,
    stt_config: SttConfig,
    llm: Arc<LlmGateway>,
    tts: Arc<TtsGateway>,
    session_manager: Arc<SessionManager>,
    observer_tx: broadcast::Sender<Event>,
    interrupt: Arc<Notify>,
    next_turn_id: u64,
) -> ControllerHandles {
    let (audio_tx, audio_rx) = mpsc::channel(512);
    let (frame_tx, frame_rx) = mpsc::channel(256);
    let (ingestion_tx, ingestion_rx) = mpsc::channel(64);
    let (stt_tx, stt_rx) = mpsc::channel(64);

    let bus = EventBus::new(frame_tx, observer_tx, user_id);
    let ingestion = IngestionSession::new(ingestion_tuning, ingestion_tx);
    let stt_handle = spawn_stt_connection(session_id, format, stt_config, stt_tx);

    let controller = SessionController {
        session_id,
        state: SessionState::Idle,
        correlation_id: Uuid::new_v4(),
        bus,
        session_manager,
        llm,
        tts,
        ingestion,
        ingestion_rx,
        stt_handle,
        stt_rx,
        audio_rx,
        interrupt,
        next_turn_id,
        metrics: MetricsRecorder::new(),
        utterance_started_at: None,
        first_partial_at: None,
    };

    tokio::spawn(controller.run());

    ControllerHandles { audio_tx, frame_rx }
}

impl SessionController {
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                maybe_audio = self.audio_rx.recv() => {
                    match maybe_audio {
                        Some(bytes) => self.handle_audio(bytes).await,
                        None => break,
                    }
                }
                Some(event) = self.ingestion_rx.recv() => self.handle_ingestion_event(event).await,
                Some(event) = self.stt_rx.recv() => self.handle_stt_event(event).await,
            }
        }
        self.shutdown().await;
    }

    /// Raw client audio is only meaningful while we're collecting an
    /// utterance; during `thinking`/`speaking` there is no transition back
    /// to `listening` in the state machine, so it's dropped (the client
    /// uses `interrupt` to cut a response short, not more audio).
    async fn handle_audio(&mut self, bytes: Vec<u8>) {
        match self.state {
            SessionState::Idle | SessionState::Listening | SessionState::Finalizing => {
                self.ingestion.push_audio(&bytes).await;
            }
            _ => {
                tracing::debug!(session_id = %self.session_id, state = ?self.state, "dropping audio outside listening window");
            }
        }
    }

    async fn handle_ingestion_event(&mut self, event: IngestionEvent) {
        match event {
            IngestionEvent::UtteranceStart => {
                self.correlation_id = Uuid::new_v4();
                self.utterance_started_at = Some(Instant::now());
                self.state = SessionState::Listening;
                self.bus
                    .emit(self.session_id, self.correlation_id, EventKind::UtteranceStart)
                    .await;
            }
            IngestionEvent::Pcm(bytes) => {
                self.stt_handle.send_audio(bytes);
            }
            IngestionEvent::UtteranceEnd(reason) => {
                self.state = SessionState::Finalizing;
                let stop_reason = match reason {
                    UtteranceEndReason::Silence { silence_ms } => {
                        self.metrics.record_stt_silence_detection(silence_ms);
                        StopReason::Silence { silence_ms }
                    }
                    UtteranceEndReason::MaxUtterance { elapsed_ms } => {
                        StopReason::MaxUtterance { elapsed_ms }
                    }
                };
                self.bus
                    .emit(
                        self.session_id,
                        self.correlation_id,
                        EventKind::StopListening { reason: stop_reason },
                    )
                    .await;
            }
        }
    }

    async fn handle_stt_event(&mut self, event: SttEvent) {
        match event {
            SttEvent::Connected { elapsed_ms } => {
                self.metrics.record_stt_connection(elapsed_ms);
            }
            SttEvent::Partial { text, .. } => {
                if self.state.accepts_partial_transcript() {
                    if self.first_partial_at.is_none() {
                        let now = Instant::now();
                        self.first_partial_at = Some(now);
                        if let Some(start) = self.utterance_started_at {
                            self.metrics
                                .record_stt_first_partial(now.duration_since(start).as_millis() as u64);
                        }
                    }
                    self.bus
                        .emit(self.session_id, self.correlation_id, EventKind::PartialTranscript { text })
                        .await;
                }
            }
            // Real STT engines sometimes emit the final transcript before our
            // local silence monitor notices the utterance ended, so both
            // `listening` and `finalizing` accept it.
            SttEvent::Final { text, .. } => {
                if matches!(self.state, SessionState::Listening | SessionState::Finalizing) {
                    if let Some(start) = self.utterance_started_at {
                        self.metrics
                            .record_stt_transcription_duration(Instant::now().duration_since(start).as_millis() as u64);
                    }
                    self.ingestion.reset_utterance();
                    self.first_partial_at = None;

                    self.save_turn(TurnRole::User, text.clone()).await;
                    self.bus
                        .emit(self.session_id, self.correlation_id, EventKind::FinalTranscript { text: text.clone() })
                        .await;

                    self.run_turn(text).await;
                }
            }
            SttEvent::Unavailable => {
                self.emit_error(&Error::SttUnavailable("stt connection unavailable".to_string()))
                    .await;
                self.ingestion.reset_utterance();
                self.state = SessionState::Idle;
            }
        }
    }

    /// Drives one assistant turn: LLM generation and TTS synthesis run
    /// concurrently, racing a notification from the transport layer that the
    /// client asked to interrupt. Either way, whatever text had accumulated
    /// is committed as the assistant's turn — a direct extension of the
    /// partial-commit-on-failure policy to the interrupt path.
    async fn run_turn(&mut self, user_text: String) {
        let agent = match self.session_manager.get_agent(self.session_id).await {
            Ok(agent) => agent,
            Err(e) => {
                self.emit_error(&e).await;
                self.state = SessionState::Idle;
                return;
            }
        };
        let context = self
            .session_manager
            .get_context(self.session_id, usize::MAX)
            .await
            .unwrap_or_default();

        self.state = SessionState::Thinking;
        let thinking_started_at = Instant::now();
        let pipeline_started_at = self.utterance_started_at.unwrap_or(thinking_started_at);

        let accumulated = Arc::new(SyncMutex::new(String::new()));
        let (sentence_tx, sentence_rx) = mpsc::channel::<String>(16);

        let llm_fut = drive_llm(
            self.llm.clone(),
            self.bus.clone(),
            self.session_id,
            self.correlation_id,
            agent.clone(),
            context,
            user_text,
            sentence_tx,
            accumulated.clone(),
        );
        let tts_fut = drive_tts(
            self.tts.clone(),
            self.bus.clone(),
            self.session_id,
            self.correlation_id,
            agent,
            sentence_rx,
        );

        self.state = SessionState::Speaking;

        tokio::select! {
            (llm_summary, tts_summary) = async { tokio::join!(llm_fut, tts_fut) } => {
                let text = accumulated.lock().clone();
                self.finish_turn(text, Some(llm_summary), tts_summary, pipeline_started_at, thinking_started_at).await;
            }
            _ = self.interrupt.notified() => {
                let text = accumulated.lock().clone();
                self.finish_turn(text, None, TtsRunSummary::default(), pipeline_started_at, thinking_started_at).await;
            }
        }
    }

    async fn finish_turn(
        &mut self,
        text: String,
        llm_summary: Option<LlmRunSummary>,
        tts_summary: TtsRunSummary,
        pipeline_started_at: Instant,
        thinking_started_at: Instant,
    ) {
        if let Some(summary) = &llm_summary {
            if let Some(e) = &summary.error {
                self.metrics.record_error();
                self.emit_error(e).await;
            }
        }
        if tts_summary.any_failed {
            self.metrics.record_error();
        }

        if !text.is_empty() {
            self.save_turn(TurnRole::Assistant, text.clone()).await;
        }
        self.bus
            .emit(self.session_id, self.correlation_id, EventKind::AiResponseComplete { text })
            .await;

        if let Some(summary) = &llm_summary {
            if let Some(first_fragment_at) = summary.first_fragment_at {
                self.metrics
                    .record_llm_first_fragment(first_fragment_at.duration_since(thinking_started_at).as_millis() as u64);
            }
            self.metrics
                .record_llm_total_generation(summary.completed_at.duration_since(thinking_started_at).as_millis() as u64);
        }
        for ms in &tts_summary.per_sentence_ms {
            self.metrics.record_tts_generation_per_sentence(*ms);
        }
        if let (Some(first), Some(last)) = (tts_summary.first_chunk_at, tts_summary.last_chunk_at) {
            self.metrics
                .record_tts_total_audio_streaming(last.duration_since(first).as_millis() as u64);
        }
        if let Some(first_chunk_at) = tts_summary.first_chunk_at {
            self.metrics
                .record_time_to_first_audio(first_chunk_at.duration_since(pipeline_started_at).as_millis() as u64);
        }
        let pipeline_end = tts_summary.last_chunk_at.unwrap_or_else(Instant::now);
        self.metrics
            .record_total_pipeline(pipeline_end.duration_since(pipeline_started_at).as_millis() as u64);
        self.metrics.record_turn_completed();

        self.bus
            .emit(
                self.session_id,
                self.correlation_id,
                EventKind::MetricsUpdated(Box::new(self.metrics.snapshot())),
            )
            .await;

        self.state = SessionState::Idle;
        self.utterance_started_at = None;
    }

    async fn save_turn(&mut self, role: TurnRole, text: String) {
        let turn_id = self.allocate_turn_id();
        let turn = Turn::new(turn_id, role, text);
        if let Err(e) = self.session_manager.append_turn(self.session_id, turn).await {
            self.emit_error(&e).await;
            return;
        }
        self.bus
            .emit(self.session_id, self.correlation_id, EventKind::MessageSaved { turn_id, role })
            .await;
    }

    fn allocate_turn_id(&mut self) -> u64 {
        let id = self.next_turn_id;
        self.next_turn_id += 1;
        id
    }

    async fn emit_error(&mut self, error: &Error) {
        self.metrics.record_error();
        self.bus
            .emit(
                self.session_id,
                self.correlation_id,
                EventKind::ServiceError {
                    source: error.source_tag().to_string(),
                    message: error.to_string(),
                    recoverable: error.recoverable(),
                },
            )
            .await;
        if error.is_connection_fatal() {
            self.state = SessionState::Terminated;
        }
    }

    async fn shutdown(mut self) {
        self.state = SessionState::Terminated;
        self.ingestion.reset_utterance();
        self.tts.release_session(self.session_id);
        let _ = self.session_manager.end(self.session_id, true).await;
    }
}

struct LlmRunSummary {
    first_fragment_at: Option<Instant>,
    completed_at: Instant,
    error: Option<Error>,
}

#[derive(Default)]
struct TtsRunSummary {
    first_chunk_at: Option<Instant>,
    last_chunk_at: Option<Instant>,
    per_sentence_ms: Vec<u64>,
    any_failed: bool,
}

/// Drives one turn's LLM generation: emits `ai_response_start`/`_chunk` per
/// raw delta (so their concatenation reproduces the final text exactly),
/// forwards sentence-extracted fragments to TTS, and keeps `accumulated`
/// current so a concurrent interrupt can still commit partial text.
#[allow(clippy::too_many_arguments)]
async fn drive_llm(
    llm: Arc<LlmGateway>,
    bus: EventBus,
    session_id: Uuid,
    correlation_id: Uuid,
    agent: Agent,
    context: Vec<Turn>,
    user_text: String,
    sentence_tx: mpsc::Sender<String>,
    accumulated: Arc<SyncMutex<String>>,
) -> LlmRunSummary {
    let mut first_fragment_at = None;
    let mut speaking_started = false;
    let mut error = None;

    let mut stream = llm.generate(&agent, &context, &user_text);
    loop {
        match stream.next().await {
            None => break,
            Some(Ok(LlmEvent::Delta(text))) => {
                if first_fragment_at.is_none() {
                    first_fragment_at = Some(Instant::now());
                }
                if !speaking_started {
                    speaking_started = true;
                    bus.emit(session_id, correlation_id, EventKind::AiResponseStart).await;
                }
                accumulated.lock().push_str(&text);
                bus.emit(session_id, correlation_id, EventKind::AiResponseChunk { text }).await;
            }
            Some(Ok(LlmEvent::Fragment(sentence))) => {
                let _ = sentence_tx.send(sentence).await;
            }
            Some(Ok(LlmEvent::Final { .. })) => {}
            Some(Err(e)) => {
                error = Some(e);
                break;
            }
        }
    }

    LlmRunSummary {
        first_fragment_at,
        completed_at: Instant::now(),
        error,
    }
}

/// Drives one turn's TTS synthesis: dispatches each sentence fragment as it
/// arrives, one at a time, streaming the resulting audio chunks onto the
/// session's ordered output channel and awaiting each send before moving on
/// to the next sentence.
async fn drive_tts(
    tts: Arc<TtsGateway>,
    bus: EventBus,
    session_id: Uuid,
    correlation_id: Uuid,
    agent: Agent,
    mut sentence_rx: mpsc::Receiver<String>,
) -> TtsRunSummary {
    let mut summary = TtsRunSummary::default();
    let mut index = 0usize;

    while let Some(text) = sentence_rx.recv().await {
        let dispatch_at = Instant::now();
        let mut stream = tts.synthesize_sentence(
            session_id,
            index,
            text.clone(),
            agent.tts.voice.clone(),
            agent.tts.rate,
            agent.tts.pitch,
        );

        while let Some(event) = stream.next().await {
            match event {
                TtsEvent::Start { .. } => {
                    bus.emit(
                        session_id,
                        correlation_id,
                        EventKind::TtsStart { sentence_index: index, text: text.clone() },
                    )
                    .await;
                }
                TtsEvent::Chunk { bytes, .. } => {
                    let now = Instant::now();
                    summary.first_chunk_at.get_or_insert(now);
                    summary.last_chunk_at = Some(now);
                    bus.emit_binary(session_id, bytes).await;
                }
                TtsEvent::Complete { index: completed_index, .. } => {
                    summary.per_sentence_ms.push(dispatch_at.elapsed().as_millis() as u64);
                    bus.emit(session_id, correlation_id, EventKind::TtsComplete { sentence_index: completed_index })
                        .await;
                }
                TtsEvent::Failed { message, .. } => {
                    summary.any_failed = true;
                    bus.emit(
                        session_id,
                        correlation_id,
                        EventKind::ServiceError { source: "tts".to_string(), message, recoverable: true },
                    )
                    .await;
                }
            }
        }
        index += 1;
    }

    summary
}
