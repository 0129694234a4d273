use crate::params::connect::ConnectParams;
use log::*;
use sse::connection::ConnectionId;
use sse::manager::REPLAY_LIMIT;
use sse::{Manager, OutboundFrame};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Unregisters its connection when the stream or socket serving it is dropped,
/// whichever way that happens.
pub(crate) struct ConnectionGuard {
    manager: Arc<Manager>,
    connection_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister_connection(&self.connection_id);
    }
}

/// Registers a new connection and queues its greeting followed by the recent updates
/// it missed, oldest first.
pub(crate) fn open(
    manager: &Arc<Manager>,
    params: &ConnectParams,
) -> (ConnectionGuard, UnboundedReceiver<OutboundFrame>) {
    let session_id = params.session_id();
    debug!(
        "Opening connection for {session_id} (credential {})",
        if params.has_credential() { "present" } else { "absent" }
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = manager.register_connection(session_id.clone(), params.page(), tx.clone());
    let guard = ConnectionGuard {
        manager: Arc::clone(manager),
        connection_id,
    };

    match manager.greeting(&session_id) {
        Ok(greeting) => {
            let _ = tx.send(greeting);
        }
        Err(e) => error!("Failed to serialize greeting: {e}"),
    }

    for update in manager.recent_for(&session_id, REPLAY_LIMIT).into_iter().rev() {
        match OutboundFrame::from_event(&update) {
            Ok(frame) => {
                let _ = tx.send(frame);
            }
            Err(e) => error!("Failed to serialize replayed update: {e}"),
        }
    }

    (guard, rx)
}
