//! STT Gateway: one persistent connection per session to an external STT
//! engine, with reconnect/backoff and a health probe (§4.3).

pub mod client;
pub mod protocol;

pub use client::{spawn_stt_connection, SttEvent, SttHandle};
pub use protocol::{AudioFormat, ControlMessage, SttMessage};
