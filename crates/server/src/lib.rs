//! VoxBridge Server
//!
//! WebSocket and HTTP transport around the voice pipeline: `/ws` carries
//! the session, `/health`/`/ready`/`/metrics` are for the orchestrator.

pub mod http;
pub mod metrics;
pub mod rate_limit;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use metrics::{init_metrics, spawn_metrics_collector};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("session error: {0}")]
    Session(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::Session(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        (status, self.to_string()).into_response()
    }
}
