//! HTTP surface of the prefect-admin live update relay.
//!
//! Routes:
//! - `GET /api/sse/updates`: push stream of updates (receive-only)
//! - `GET /ws/updates`: duplex socket, updates flow both ways
//! - `POST /api/sse/broadcast`: publish one update from a receive-only client
//! - `GET /api/sse/heartbeat`, `GET /api/sse/stats`, `POST /api/sse/force-refresh`
//! - `GET /health`

use axum::http::{header, HeaderValue, Method};
use log::*;
use service::AppState;
use sse::Manager;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

mod connection;
mod controller;
pub mod error;
mod params;
mod push;
pub mod router;
mod socket;

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let server_url = format!("{host}:{}", app_state.config.port);
    let listener = TcpListener::bind(&server_url).await?;
    info!("Relay listening on {server_url}");

    let _heartbeat = spawn_heartbeat(
        Arc::clone(&app_state.sse_manager),
        app_state.config.relay_heartbeat_interval(),
    );

    let cors = cors_layer(&app_state.config.allowed_origins);
    axum::serve(listener, router::define_routes(app_state).layer(cors)).await
}

/// Sweeps silent connections and pings the rest every `interval`.
pub fn spawn_heartbeat(manager: Arc<Manager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // consume first immediate tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = manager.heartbeat();
            trace!(
                "Heartbeat sent to {} client(s), {} recent update(s)",
                report.connected_clients,
                report.recent_updates
            );
        }
    })
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS, Method::POST])
        .allow_credentials(true)
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(origins)
}
