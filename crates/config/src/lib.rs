//! Layered configuration for the VoxBridge server.
//!
//! Supports loading from `config/default.yaml`, an optional
//! `config/{env}.yaml` overlay, and `VOXBRIDGE__`-prefixed environment
//! variables, in that priority order (§6 "Configuration").

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, AuthConfig, IngestionConfig, LlmConfig, LlmProviderConfig, ObservabilityConfig,
    ObserverConfig, PersistenceConfig, RateLimitConfig, RuntimeEnvironment, ServerConfig,
    SessionConfig, Settings, SttConfig, TtsConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
