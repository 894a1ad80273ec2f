//! Per-session metrics types (§4.6 "Metrics").
//!
//! The aggregation logic lives in `voxbridge-controller`; this module only
//! defines the wire shape so `voxbridge-core::Event` can carry it without a
//! dependency cycle.

use serde::{Deserialize, Serialize};

/// Running min/max/mean/count for one latency sample stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyAggregate {
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    pub count: u64,
}

impl LatencyAggregate {
    pub fn record(&mut self, sample_ms: u64) {
        if self.count == 0 {
            self.min_ms = sample_ms;
            self.max_ms = sample_ms;
        } else {
            self.min_ms = self.min_ms.min(sample_ms);
            self.max_ms = self.max_ms.max(sample_ms);
        }
        // Incremental mean avoids re-summing the whole history per sample.
        self.mean_ms += (sample_ms as f64 - self.mean_ms) / (self.count + 1) as f64;
        self.count += 1;
    }
}

/// Snapshot of one session's accumulated metrics, emitted via
/// `metrics_updated` once per completed turn (§4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetricsSnapshot {
    pub stt_connection: LatencyAggregate,
    pub stt_first_partial: LatencyAggregate,
    pub stt_transcription_duration: LatencyAggregate,
    pub stt_silence_detection: LatencyAggregate,

    pub llm_first_fragment: LatencyAggregate,
    pub llm_total_generation: LatencyAggregate,
    pub llm_response_parsing: LatencyAggregate,

    pub tts_generation_per_sentence: LatencyAggregate,
    pub tts_total_audio_streaming: LatencyAggregate,

    pub time_to_first_audio: LatencyAggregate,
    pub total_pipeline: LatencyAggregate,

    pub turn_count: u64,
    pub error_count: u64,
}
