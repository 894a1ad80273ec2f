//! HTTP Endpoints
//!
//! Everything that isn't the `/ws` pipeline: liveness/readiness probes and
//! the Prometheus scrape target.

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::websocket::ws_handler;

pub fn create_router(state: AppState) -> Router {
    let config = state.config.read();
    let cors_layer = build_cors_layer(&config.server.cors_origins, config.server.cors_enabled);
    drop(config);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// - `enabled = false` returns a permissive layer (dev only).
/// - Empty `origins` defaults to `localhost:3000`.
/// - Otherwise uses the configured origins with credentials allowed.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (not for production)");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        tracing::info!("no CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("all configured CORS origins are invalid, falling back to localhost");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
    }

    tracing::info!(count = parsed_origins.len(), "CORS configured with explicit origins");
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_credentials(true)
}

/// Liveness: the process is up and can serve requests. Does not depend on
/// any downstream (STT/LLM/TTS/store) being reachable.
async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Readiness: the process holds a usable session cache. Downstream service
/// reachability is probed per-connection instead (§7 reconnect/backoff), not
/// here, so this never flaps due to a transient STT/LLM outage.
async fn readiness_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let active = state.list_active_sessions().len();
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ready", "active_sessions": active })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxbridge_config::Settings;

    #[test]
    fn router_builds_from_default_settings() {
        let state = AppState::with_defaults(Settings::default());
        let _router = create_router(state);
    }
}
