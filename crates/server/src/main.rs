//! VoxBridge server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voxbridge_config::{load_settings, Settings};
use voxbridge_core::traits::Store;
use voxbridge_server::{create_router, init_metrics, spawn_metrics_collector, AppState};
use voxbridge_store::InMemoryStore;
#[cfg(feature = "scylla-backend")]
use voxbridge_store::ScyllaStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("VOXBRIDGE_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing isn't initialized yet, so this goes straight to stderr.
            eprintln!(
                "loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("warning: failed to load config: {e}. Using defaults.");
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting voxbridge server");
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "configuration loaded"
    );

    let handle = init_metrics();
    let _ = handle; // kept alive implicitly by the installed global recorder
    tracing::info!("initialized prometheus metrics at /metrics");

    let store: Arc<dyn Store> = if config.persistence.enabled {
        tracing::info!("persistence enabled, connecting to ScyllaDB");
        match connect_store(&config).await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "failed to connect to ScyllaDB, falling back to in-memory store");
                Arc::new(InMemoryStore::new())
            }
        }
    } else {
        tracing::info!("persistence disabled, using in-memory session store");
        Arc::new(InMemoryStore::new())
    };

    let state = AppState::new(config.clone(), store, env);
    spawn_metrics_collector(state.observer_tx.subscribe());

    let active = state.list_active_sessions().len();
    tracing::info!(active_sessions = active, "application state initialized");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

#[cfg(feature = "scylla-backend")]
async fn connect_store(config: &Settings) -> Result<Arc<dyn Store>, voxbridge_core::Error> {
    let store = ScyllaStore::connect(&config.persistence).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "scylla-backend"))]
async fn connect_store(_config: &Settings) -> Result<Arc<dyn Store>, voxbridge_core::Error> {
    Err(voxbridge_core::Error::Configuration(
        "persistence.enabled is set but the scylla-backend feature is not compiled in".to_string(),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("voxbridge={level},tower_http=debug").into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
