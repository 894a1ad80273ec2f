//! Event Bus & Session Controller (§4.6): per-session state machine that
//! wires ingestion, STT, LLM and TTS together and drives each turn.

pub mod bus;
pub mod controller;
pub mod frame;
pub mod metrics;
pub mod state;

pub use bus::EventBus;
pub use controller::{spawn, ControllerHandles, SessionController};
pub use frame::ClientFrame;
pub use metrics::MetricsRecorder;
pub use state::SessionState;
