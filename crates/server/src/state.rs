//! Application State
//!
//! Shared state across all HTTP/WebSocket handlers.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use voxbridge_config::{load_settings, Settings};
use voxbridge_core::traits::Store;
use voxbridge_core::Event;
use voxbridge_llm::LlmGateway;
use voxbridge_session::SessionManager;
use voxbridge_store::InMemoryStore;
use voxbridge_tts::TtsGateway;

/// Shared across every connection. Cheap to clone: everything behind an
/// `Arc`, the config behind an `Arc<RwLock<_>>` for hot-reload.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub store: Arc<dyn Store>,
    pub sessions: Arc<SessionManager>,
    pub llm: Arc<LlmGateway>,
    pub tts: Arc<TtsGateway>,
    /// Process-wide fan-out of every session's events, observed by the
    /// metrics collector. Each connection's controller is handed a clone
    /// of the sender; nothing but `spawn_metrics_collector` reads it.
    pub observer_tx: broadcast::Sender<Event>,
    env: Option<String>,
}

impl AppState {
    /// Wires up a fresh application state from loaded settings and a
    /// concrete store (in-memory, or ScyllaDB-backed when
    /// `persistence.enabled`).
    pub fn new(config: Settings, store: Arc<dyn Store>, env: Option<String>) -> Self {
        let tts = Arc::new(TtsGateway::new(
            &config.tts,
            std::time::Duration::from_secs(config.tts.per_sentence_total_timeout_s),
        ));
        let llm = Arc::new(LlmGateway::new(config.llm.clone()));
        let sessions = SessionManager::new(store.clone(), config.session.clone());
        let (observer_tx, _) = broadcast::channel(config.observer.buffer_frames);

        Self {
            config: Arc::new(RwLock::new(config)),
            store,
            sessions,
            llm,
            tts,
            observer_tx,
            env,
        }
    }

    /// Convenience constructor for tests and local runs: in-memory store,
    /// no environment overlay.
    pub fn with_defaults(config: Settings) -> Self {
        Self::new(config, Arc::new(InMemoryStore::new()), None)
    }

    /// Re-reads configuration from files/environment and swaps it in.
    /// Settings already captured into per-component structs at connection
    /// time (e.g. an in-flight controller's `SttConfig`) are unaffected;
    /// only values read fresh from `AppState::get_config` pick this up.
    pub fn reload_config(&self) -> Result<(), String> {
        let new_config = load_settings(self.env.as_deref())
            .map_err(|e| format!("failed to reload config: {e}"))?;
        *self.config.write() = new_config;
        tracing::info!("configuration reloaded");
        Ok(())
    }

    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }

    /// Lists sessions the cache considers active, as a startup/diagnostic
    /// aid. Does not attempt to restore in-flight pipeline state for them;
    /// a client that reconnects with the same session id simply resumes
    /// against the persisted turn history.
    pub fn list_active_sessions(&self) -> Vec<uuid::Uuid> {
        self.sessions.list_active()
    }
}
