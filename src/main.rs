//! Crowdplay Back binary entrypoint wiring REST, WebSocket, SSE and the analytics store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "couch-store")]
use crowdplay_back::dao::move_log::couchdb;
#[cfg(feature = "mongo-store")]
use crowdplay_back::dao::move_log::mongodb;
use crowdplay_back::{
    config::AppConfig,
    dao::{move_log::MoveLog, storage::StorageError},
    engine::HeadlessEngineFactory,
    routes,
    services::{sse_events, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config, Arc::new(HeadlessEngineFactory));

    spawn_move_log_supervisor(&app_state);
    tokio::spawn(forward_degraded_updates(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal(app_state.clone()))
        .await
        .context("serving axum")?;

    info!("server stopped");
    Ok(())
}

/// Start the storage supervisor for the backend selected by `MOVE_LOG_BACKEND`.
fn spawn_move_log_supervisor(state: &SharedState) {
    let backend = env::var("MOVE_LOG_BACKEND").unwrap_or_else(|_| "mongo".into());
    match backend.to_ascii_lowercase().as_str() {
        #[cfg(feature = "mongo-store")]
        "mongo" | "mongodb" => {
            if env::var("MONGO_URI").is_err() {
                warn!("MONGO_URI is not set; move history stays disabled (degraded mode)");
                return;
            }
            tokio::spawn(storage_supervisor::run(state.clone(), connect_mongo));
        }
        #[cfg(feature = "couch-store")]
        "couch" | "couchdb" => {
            if let Err(err) = couchdb::CouchConfig::from_env() {
                warn!(error = %err, "CouchDB is not configured; move history stays disabled (degraded mode)");
                return;
            }
            tokio::spawn(storage_supervisor::run(state.clone(), connect_couch));
        }
        other => {
            warn!(backend = %other, "unsupported move log backend; move history stays disabled (degraded mode)");
        }
    }
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> Result<Arc<dyn MoveLog>, StorageError> {
    let config = mongodb::MongoConfig::from_env().await?;
    let store = mongodb::MongoMoveLog::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> Result<Arc<dyn MoveLog>, StorageError> {
    let config = couchdb::CouchConfig::from_env()?;
    let store = couchdb::CouchMoveLog::connect(config).await?;
    Ok(Arc::new(store))
}

/// Push degraded mode changes onto the public SSE stream.
async fn forward_degraded_updates(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        sse_events::broadcast_system_status(state.public_sse(), degraded);
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM, then save the session and end the streams
/// before the HTTP server drains.
async fn shutdown_signal(state: SharedState) {
    wait_for_signal().await;
    info!("shutdown signal received");
    state.shutdown().await;
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
