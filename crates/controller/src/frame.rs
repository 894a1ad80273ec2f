//! Outbound client frames (§6): events and binary audio share one ordered
//! channel so the transport layer only has to drain a single queue in
//! emission order — this is what makes the `tts_complete`-after-last-chunk
//! guarantee (§4.5, §9) fall out of sequential sends rather than a timer.

use voxbridge_core::Event;

#[derive(Debug, Clone)]
pub enum ClientFrame {
    Event(Event),
    Binary(Vec<u8>),
}
