//! Centralized constants: default values for options that are normally
//! supplied via environment variables, with a hardcoded fallback so a
//! bare `cargo run` still boots something usable in development.

/// Service endpoints (env override, fallback default).
pub mod endpoints {
    use once_cell::sync::Lazy;

    /// External STT engine websocket endpoint (env: STT_URL).
    pub static STT_DEFAULT: Lazy<String> =
        Lazy::new(|| std::env::var("STT_URL").unwrap_or_else(|_| "ws://127.0.0.1:9001/stt".to_string()));

    /// TTS synthesis endpoint (env: TTS_URL).
    pub static TTS_DEFAULT: Lazy<String> =
        Lazy::new(|| std::env::var("TTS_URL").unwrap_or_else(|_| "http://127.0.0.1:9002/tts".to_string()));

    /// Cloud LLM provider base URL (env: LLM_CLOUD_URL).
    pub static LLM_CLOUD_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("LLM_CLOUD_URL").unwrap_or_else(|_| "https://api.anthropic.com".to_string())
    });

    /// Local LLM provider base URL (env: LLM_LOCAL_URL).
    pub static LLM_LOCAL_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("LLM_LOCAL_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".to_string())
    });
}

/// Ingestion / utterance-boundary timing (§4.2 defaults).
pub mod ingestion {
    pub const SILENCE_THRESHOLD_MS: u64 = 600;
    pub const MAX_UTTERANCE_TIME_MS: u64 = 45_000;
    pub const CONTAINER_BUFFER_MAX_BYTES: usize = 524_288;
    pub const CONTAINER_BUFFER_MIN_PARSE_BYTES: usize = 1024;
    pub const MONITOR_INTERVAL_MS: u64 = 100;
}

/// Session cache defaults (§4.1).
pub mod session {
    pub const CONTEXT_CACHE_TTL_MIN: u64 = 15;
    pub const CONTEXT_MAX_TURNS: usize = 20;
    pub const CACHE_CLEANUP_INTERVAL_S: u64 = 60;
}

/// STT gateway defaults (§4.3).
pub mod stt {
    pub const RECONNECT_ATTEMPTS: u32 = 5;
    pub const RECONNECT_DELAY_S: u64 = 2;
    pub const RECONNECT_DELAY_CAP_S: u64 = 30;
    pub const HEALTH_PROBE_INTERVAL_S: u64 = 30;
}

/// LLM gateway defaults (§4.4).
pub mod llm {
    pub const TIMEOUT_S: u64 = 120;
    pub const FRAGMENT_QUIET_PERIOD_S: u64 = 30;
    pub const MIN_SENTENCE_LENGTH: usize = 2;
}

/// TTS gateway defaults (§4.5).
pub mod tts {
    pub const SAMPLE_RATE: u32 = 24_000;
    pub const RETRY_ATTEMPTS: u32 = 3;
    pub const PER_SENTENCE_TOTAL_TIMEOUT_S: u64 = 60;
}

/// Observer channel defaults (§4.6).
pub mod observer {
    pub const BUFFER_FRAMES: usize = 256;
    pub const WRITE_TIMEOUT_MS: u64 = 1000;
}
