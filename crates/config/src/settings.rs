//! Main settings module.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{ingestion, llm, observer, session, stt, tts};
use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Top-level settings, one section per pipeline component.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub messages_per_second: u32,
    pub burst_multiplier: f32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            messages_per_second: 50,
            burst_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    pub cors_enabled: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 1000,
            timeout_seconds: 300,
            rate_limit: RateLimitConfig::default(),
            cors_enabled: false,
            cors_origins: Vec::new(),
            auth: AuthConfig::default(),
        }
    }
}

/// Audio Ingestion defaults (§4.2-4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub silence_threshold_ms: u64,
    pub max_utterance_time_ms: u64,
    pub container_buffer_max_bytes: usize,
    pub container_buffer_min_parse_bytes: usize,
    pub monitor_interval_ms: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            silence_threshold_ms: ingestion::SILENCE_THRESHOLD_MS,
            max_utterance_time_ms: ingestion::MAX_UTTERANCE_TIME_MS,
            container_buffer_max_bytes: ingestion::CONTAINER_BUFFER_MAX_BYTES,
            container_buffer_min_parse_bytes: ingestion::CONTAINER_BUFFER_MIN_PARSE_BYTES,
            monitor_interval_ms: ingestion::MONITOR_INTERVAL_MS,
        }
    }
}

/// Session Manager cache defaults (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub context_cache_ttl_min: u64,
    pub context_max_turns: usize,
    pub cache_cleanup_interval_s: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_cache_ttl_min: session::CONTEXT_CACHE_TTL_MIN,
            context_max_turns: session::CONTEXT_MAX_TURNS,
            cache_cleanup_interval_s: session::CACHE_CLEANUP_INTERVAL_S,
        }
    }
}

/// STT Gateway defaults (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    pub url: String,
    pub model: String,
    pub language: String,
    pub reconnect_attempts: u32,
    pub reconnect_delay_s: u64,
    pub reconnect_delay_cap_s: u64,
    pub health_probe_interval_s: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            url: crate::constants::endpoints::STT_DEFAULT.clone(),
            model: "default".to_string(),
            language: "en".to_string(),
            reconnect_attempts: stt::RECONNECT_ATTEMPTS,
            reconnect_delay_s: stt::RECONNECT_DELAY_S,
            reconnect_delay_cap_s: stt::RECONNECT_DELAY_CAP_S,
            health_probe_interval_s: stt::HEALTH_PROBE_INTERVAL_S,
        }
    }
}

/// One LLM provider's connection details (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// LLM Gateway defaults (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub timeout_s: u64,
    pub fragment_quiet_period_s: u64,
    pub streaming_enabled: bool,
    pub fallback_enabled: bool,
    pub min_sentence_length: usize,
    pub use_clause_splitting: bool,
    pub cloud: LlmProviderConfig,
    pub local: LlmProviderConfig,
    pub webhook: LlmProviderConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_s: llm::TIMEOUT_S,
            fragment_quiet_period_s: llm::FRAGMENT_QUIET_PERIOD_S,
            streaming_enabled: true,
            fallback_enabled: true,
            min_sentence_length: llm::MIN_SENTENCE_LENGTH,
            use_clause_splitting: false,
            cloud: LlmProviderConfig {
                base_url: crate::constants::endpoints::LLM_CLOUD_DEFAULT.clone(),
                api_key: None,
                model: "claude-3-5-sonnet-20241022".to_string(),
            },
            local: LlmProviderConfig {
                base_url: crate::constants::endpoints::LLM_LOCAL_DEFAULT.clone(),
                api_key: None,
                model: "llama3".to_string(),
            },
            webhook: LlmProviderConfig::default(),
        }
    }
}

/// TTS Gateway defaults (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    pub url: String,
    pub default_voice: String,
    pub sample_rate: u32,
    pub retry_attempts: u32,
    pub per_sentence_total_timeout_s: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: crate::constants::endpoints::TTS_DEFAULT.clone(),
            default_voice: "default".to_string(),
            sample_rate: tts::SAMPLE_RATE,
            retry_attempts: tts::RETRY_ATTEMPTS,
            per_sentence_total_timeout_s: tts::PER_SENTENCE_TOTAL_TIMEOUT_S,
        }
    }
}

/// Observer broadcast channel defaults (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    pub buffer_frames: usize,
    pub write_timeout_ms: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            buffer_frames: observer::BUFFER_FRAMES,
            write_timeout_ms: observer::WRITE_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_json: bool,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Persistent store configuration. `enabled = false` keeps the in-memory
/// store (the default used in development and tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub scylla_hosts: Vec<String>,
    pub keyspace: String,
    pub replication_factor: u8,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: vec!["127.0.0.1:9042".to_string()],
            keyspace: "voxbridge".to_string(),
            replication_factor: 1,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_ingestion()?;
        self.validate_llm()?;
        self.validate_tts()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "port cannot be 0".to_string(),
            });
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_connections".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let rl = &self.server.rate_limit;
        if rl.enabled && rl.messages_per_second == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.rate_limit.messages_per_second".to_string(),
                message: "must be at least 1 when rate limiting is enabled".to_string(),
            });
        }
        if self.environment.is_production() && self.server.auth.enabled && self.server.auth.api_key.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "server.auth.api_key".to_string(),
                message: "API key must be set when auth is enabled in production".to_string(),
            });
        }
        Ok(())
    }

    fn validate_ingestion(&self) -> Result<(), ConfigError> {
        if self.ingestion.silence_threshold_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingestion.silence_threshold_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.ingestion.max_utterance_time_ms <= self.ingestion.silence_threshold_ms {
            return Err(ConfigError::InvalidValue {
                field: "ingestion.max_utterance_time_ms".to_string(),
                message: "must exceed silence_threshold_ms".to_string(),
            });
        }
        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if self.llm.timeout_s == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.timeout_s".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.llm.min_sentence_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.min_sentence_length".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.llm.fallback_enabled && self.llm.webhook.base_url.is_empty() {
            tracing::warn!(
                "llm.fallback_enabled is set but llm.webhook.base_url is empty; fallback will fail"
            );
        }
        Ok(())
    }

    fn validate_tts(&self) -> Result<(), ConfigError> {
        if self.tts.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tts.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`VOXBRIDGE__` prefix, `__` section separator)
/// 2. `config/{env}.yaml` (if `env` is specified)
/// 3. `config/default.yaml`
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOXBRIDGE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        settings.validate().unwrap();
    }

    #[test]
    fn rejects_zero_silence_threshold() {
        let mut settings = Settings::default();
        settings.ingestion.silence_threshold_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_max_utterance_below_silence_threshold() {
        let mut settings = Settings::default();
        settings.ingestion.max_utterance_time_ms = settings.ingestion.silence_threshold_ms;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn production_requires_api_key_when_auth_enabled() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        settings.server.auth.enabled = true;
        assert!(settings.validate().is_err());
        settings.server.auth.api_key = Some("secret".to_string());
        settings.validate().unwrap();
    }
}
