//! TTS Gateway (§4.5): HTTP synthesis backend plus a per-session ordered
//! queue that enforces one sentence in flight at a time.

pub mod gateway;
pub mod provider;

pub use gateway::{TtsEvent, TtsGateway};
pub use provider::HttpTtsProvider;
