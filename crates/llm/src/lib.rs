//! LLM Gateway (§4.4): pluggable cloud/local/webhook providers behind a
//! single streaming entry point, with sentence extraction and timeout
//! enforcement.

pub mod context;
pub mod gateway;
pub mod provider;
pub mod sentence;

pub use context::build_messages;
pub use gateway::{LlmEvent, LlmGateway};
pub use provider::HttpLlmProvider;
pub use sentence::SentenceExtractor;
