//! Prometheus metrics endpoint (SPEC_FULL.md §C), alongside the
//! `metrics_updated` event each session already emits over its own
//! channel (§4.6). A background task folds every session's snapshot into
//! process-wide histograms; this module only owns the exporter and the
//! `/metrics` handler.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tokio::sync::broadcast;

use voxbridge_core::{Event, EventKind, LatencyAggregate, SessionMetricsSnapshot};

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the global Prometheus recorder. Call once at startup, before
/// any `metrics::*!` call site runs.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder");
    let _ = HANDLE.set(handle.clone());
    handle
}

pub async fn metrics_handler() -> impl IntoResponse {
    match HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}

/// Subscribes to the process-wide observer channel and records every
/// `metrics_updated` snapshot as Prometheus observations. Runs for the
/// life of the process; a lagging receiver just skips the events it
/// missed; there is nothing to recover.
pub fn spawn_metrics_collector(mut observer_rx: broadcast::Receiver<Event>) {
    tokio::spawn(async move {
        loop {
            match observer_rx.recv().await {
                Ok(event) => {
                    if let EventKind::MetricsUpdated(snapshot) = event.kind {
                        record_snapshot(&snapshot);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "metrics collector lagged behind observer channel");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Each field's running mean is recorded as one histogram observation per
/// completed turn; over many turns the histogram's own quantiles converge
/// on the true distribution closely enough for dashboards, without having
/// to thread every individual sample out through the event bus.
fn record_snapshot(snapshot: &SessionMetricsSnapshot) {
    record_latency("voxbridge_stt_connection_ms", &snapshot.stt_connection);
    record_latency("voxbridge_stt_first_partial_ms", &snapshot.stt_first_partial);
    record_latency(
        "voxbridge_stt_transcription_duration_ms",
        &snapshot.stt_transcription_duration,
    );
    record_latency(
        "voxbridge_stt_silence_detection_ms",
        &snapshot.stt_silence_detection,
    );
    record_latency("voxbridge_llm_first_fragment_ms", &snapshot.llm_first_fragment);
    record_latency(
        "voxbridge_llm_total_generation_ms",
        &snapshot.llm_total_generation,
    );
    record_latency(
        "voxbridge_tts_generation_per_sentence_ms",
        &snapshot.tts_generation_per_sentence,
    );
    record_latency(
        "voxbridge_tts_total_audio_streaming_ms",
        &snapshot.tts_total_audio_streaming,
    );
    record_latency("voxbridge_time_to_first_audio_ms", &snapshot.time_to_first_audio);
    record_latency("voxbridge_total_pipeline_ms", &snapshot.total_pipeline);

    metrics::counter!("voxbridge_turns_total").absolute(snapshot.turn_count);
    metrics::counter!("voxbridge_errors_total").absolute(snapshot.error_count);
}

fn record_latency(name: &'static str, aggregate: &LatencyAggregate) {
    if aggregate.count > 0 {
        metrics::histogram!(name).record(aggregate.mean_ms);
    }
}
