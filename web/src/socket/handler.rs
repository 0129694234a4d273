use crate::connection;
use crate::params::connect::ConnectParams;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use log::*;
use service::AppState;

/// WebSocket upgrade handler.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params, app_state))
}

/// Forwards outbound frames to the socket and inbound text to the relay until either
/// side stops.
async fn handle_socket(socket: WebSocket, params: ConnectParams, app_state: AppState) {
    let (_guard, mut rx) = connection::open(&app_state.sse_manager, &params);
    let (mut ws_tx, mut ws_rx) = socket.split();
    let manager = app_state.sse_manager.clone();

    let writer = async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(Message::Text(frame.data)).await.is_err() {
                break;
            }
        }
    };

    let reader = async move {
        while let Some(Ok(message)) = ws_rx.next().await {
            match message {
                Message::Text(text) => {
                    if let Err(e) = manager.receive(&text) {
                        warn!("Discarding malformed socket message: {e}");
                    }
                }
                Message::Close(_) => break,
                // axum answers pings itself
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }
    debug!("Socket connection closed");
}
