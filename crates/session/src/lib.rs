//! Session Manager (§4.1): a cache of active sessions keyed by session id,
//! backed by the persistent `Store`, with read-through agent/context caching
//! and a background sweeper that evicts idle entries without closing them.

mod manager;

pub use manager::{SessionHandle, SessionManager};
