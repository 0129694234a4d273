use crate::error::{Error, Result};
use crate::params::force_refresh::ForceRefreshParams;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use log::*;
use serde_json::json;
use service::AppState;
use sse::manager::Received;

/// POST an update from a client that cannot send over its own connection.
///
/// The body is the same JSON a socket client would send. It is forwarded to every
/// connection except those of its origin.
pub async fn broadcast(
    State(app_state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse> {
    let broadcast_to = match app_state.sse_manager.receive(&body)? {
        Received::Published(delivered) => delivered,
        Received::Touched | Received::Ignored => 0,
    };
    debug!("Broadcast request reached {broadcast_to} client(s)");

    Ok(Json(json!({
        "success": true,
        "broadcastTo": broadcast_to,
    })))
}

/// GET drop silent connections, ping the rest and report who is connected
pub async fn heartbeat(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.sse_manager.heartbeat())
}

/// GET connection and replay window statistics
pub async fn stats(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.sse_manager.stats())
}

/// POST ask clients on one page, or on every page, to reload their data
pub async fn force_refresh(
    State(app_state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse> {
    let params: ForceRefreshParams = if body.trim().is_empty() {
        ForceRefreshParams::default()
    } else {
        serde_json::from_str(&body).map_err(|e| Error::Malformed(Box::new(e)))?
    };
    let target = params.target();

    let refreshed_clients = app_state
        .sse_manager
        .force_refresh(target, params.message);

    Ok(Json(json!({
        "success": true,
        "refreshedClients": refreshed_clients,
        "targetPage": target.map_or("all", |page| page.as_str()),
    })))
}
