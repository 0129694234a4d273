use crate::connection;
use crate::params::connect::ConnectParams;
use async_stream::stream;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use log::*;
use service::AppState;
use std::convert::Infallible;

/// SSE handler that establishes a long-lived, receive-only connection for live updates.
/// The client announces its own changes through the broadcast endpoint.
pub(crate) async fn sse_handler(
    Query(params): Query<ConnectParams>,
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (guard, mut rx) = connection::open(&app_state.sse_manager, &params);

    let stream = stream! {
        // Dropped with the stream when the client goes away.
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            let event = Event::default().event(frame.event_type).data(frame.data);
            yield Ok::<Event, Infallible>(event);
        }
        debug!("SSE connection channel closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
