//! Per-session metrics aggregation (§4.6 "Metrics"). Samples are recorded
//! at the state-transition points in [`crate::controller::SessionController`]
//! and folded into running aggregates; a snapshot is emitted once per
//! completed cycle.

use voxbridge_core::SessionMetricsSnapshot;

#[derive(Debug, Default)]
pub struct MetricsRecorder {
    snapshot: SessionMetricsSnapshot,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_stt_connection(&mut self, ms: u64) {
        self.snapshot.stt_connection.record(ms);
    }

    pub fn record_stt_first_partial(&mut self, ms: u64) {
        self.snapshot.stt_first_partial.record(ms);
    }

    pub fn record_stt_transcription_duration(&mut self, ms: u64) {
        self.snapshot.stt_transcription_duration.record(ms);
    }

    pub fn record_stt_silence_detection(&mut self, ms: u64) {
        self.snapshot.stt_silence_detection.record(ms);
    }

    pub fn record_llm_first_fragment(&mut self, ms: u64) {
        self.snapshot.llm_first_fragment.record(ms);
    }

    pub fn record_llm_total_generation(&mut self, ms: u64) {
        self.snapshot.llm_total_generation.record(ms);
    }

    pub fn record_tts_generation_per_sentence(&mut self, ms: u64) {
        self.snapshot.tts_generation_per_sentence.record(ms);
    }

    pub fn record_tts_total_audio_streaming(&mut self, ms: u64) {
        self.snapshot.tts_total_audio_streaming.record(ms);
    }

    pub fn record_time_to_first_audio(&mut self, ms: u64) {
        self.snapshot.time_to_first_audio.record(ms);
    }

    pub fn record_total_pipeline(&mut self, ms: u64) {
        self.snapshot.total_pipeline.record(ms);
    }

    pub fn record_turn_completed(&mut self) {
        self.snapshot.turn_count += 1;
    }

    pub fn record_error(&mut self) {
        self.snapshot.error_count += 1;
    }

    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        self.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_accumulate_across_turns() {
        let mut recorder = MetricsRecorder::new();
        recorder.record_llm_first_fragment(100);
        recorder.record_llm_first_fragment(300);
        recorder.record_turn_completed();
        recorder.record_turn_completed();

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.llm_first_fragment.count, 2);
        assert_eq!(snapshot.llm_first_fragment.min_ms, 100);
        assert_eq!(snapshot.llm_first_fragment.max_ms, 300);
        assert_eq!(snapshot.llm_first_fragment.mean_ms, 200.0);
        assert_eq!(snapshot.turn_count, 2);
    }

    #[test]
    fn unrecorded_fields_stay_empty() {
        let recorder = MetricsRecorder::new();
        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.total_pipeline.count, 0);
        assert_eq!(snapshot.error_count, 0);
    }
}
