// [[VIGIL]]/apps/watch-server/src/main.rs
// Purpose: Entry point. Resolves configuration and starts the server.
// Architecture: Application Boot
// Dependencies: Axum, Tower, Tokio

mod config;
mod models;
mod monitor;
mod patterns;
mod server;
mod sessions;
mod store;
mod transcript;

use anyhow::Context;
use axum::{
    http::Method,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::WatchConfig;
use crate::server::{handlers, WatchState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vigil_watch=debug".parse()?)
                .add_directive("tower_http=trace".parse()?),
        )
        .init();

    tracing::info!("Initializing VIGIL Watch Server...");

    let config = WatchConfig::from_env();
    tracing::info!(
        "Watching sessions under {:?}, alerts document at {:?}",
        config.sessions_dir,
        config.alerts_file
    );

    let state = Arc::new(WatchState::new(&config));

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/alerts",
            get(handlers::list_alerts).post(handlers::create_alert),
        )
        .route(
            "/alerts/:id",
            get(handlers::get_alert)
                .patch(handlers::update_alert)
                .delete(handlers::delete_alert),
        )
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("VIGIL Watch Server listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
