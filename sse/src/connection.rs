use crate::message::OutboundFrame;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use events::Page;
use log::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// The client-chosen session id (`userId` on the wire).
pub type SessionId = String;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub session_id: SessionId,
    pub page: Page,
    pub sender: UnboundedSender<OutboundFrame>,
    pub connected_at: DateTime<Utc>,
    /// Last successful send to, or heartbeat from, this client.
    pub last_ping: DateTime<Utc>,
}

/// A connected client as reported by the heartbeat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub id: SessionId,
    pub page: Page,
    /// Milliseconds since the connection was registered.
    pub connected_for: i64,
    /// Milliseconds since the last ping.
    pub last_ping: i64,
}

/// Connection registry with dual indices: by connection for registration and cleanup,
/// by session for routing and origin exclusion.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionInfo>,
    session_index: DashMap<SessionId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            session_index: DashMap::new(),
        }
    }

    pub fn register(
        &self,
        session_id: SessionId,
        page: Page,
        sender: UnboundedSender<OutboundFrame>,
    ) -> ConnectionId {
        let connection_id = ConnectionId::new();
        let now = Utc::now();

        self.connections.insert(
            connection_id.clone(),
            ConnectionInfo {
                session_id: session_id.clone(),
                page,
                sender,
                connected_at: now,
                last_ping: now,
            },
        );

        self.session_index
            .entry(session_id)
            .or_default()
            .insert(connection_id.clone());

        connection_id
    }

    /// Returns the removed connection's session, if it was still registered.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<SessionId> {
        let (_, info) = self.connections.remove(connection_id)?;
        let session_id = info.session_id;

        if let Some(mut entry) = self.session_index.get_mut(&session_id) {
            entry.remove(connection_id);

            if entry.is_empty() {
                drop(entry); // Release lock before removal
                self.session_index.remove(&session_id);
            }
        }

        Some(session_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn session_connections(&self, session_id: &str) -> usize {
        self.session_index
            .get(session_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// Records an inbound heartbeat for every connection of a session.
    pub fn touch(&self, session_id: &str, now: DateTime<Utc>) {
        let Some(ids) = self.session_index.get(session_id) else {
            return;
        };
        for id in ids.iter() {
            if let Some(mut info) = self.connections.get_mut(id) {
                info.last_ping = now;
            }
        }
    }

    /// Sends to every connection matching `filter`. Connections whose receiver is gone are
    /// removed. Returns how many connections the frame reached.
    pub fn send_where<F>(&self, frame: &OutboundFrame, filter: F) -> usize
    where
        F: Fn(&ConnectionInfo) -> bool,
    {
        let now = Utc::now();
        let mut delivered = 0;
        let mut dead = Vec::new();

        for mut entry in self.connections.iter_mut() {
            if !filter(entry.value()) {
                continue;
            }
            match entry.value().sender.send(frame.clone()) {
                Ok(()) => {
                    entry.value_mut().last_ping = now;
                    delivered += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to send {} to connection {}: {e}. Connection will be cleaned up.",
                        frame.event_type,
                        entry.key().as_str()
                    );
                    dead.push(entry.key().clone());
                }
            }
        }

        for id in dead {
            self.unregister(&id);
        }
        delivered
    }

    /// Every connection except those belonging to `origin`.
    pub fn send_to_all_except(&self, origin: &str, frame: &OutboundFrame) -> usize {
        self.send_where(frame, |info| info.session_id != origin)
    }

    pub fn broadcast(&self, frame: &OutboundFrame) -> usize {
        self.send_where(frame, |_| true)
    }

    /// Removes connections silent for longer than `max_silence` or whose receiver is gone.
    pub fn sweep_stale(&self, now: DateTime<Utc>, max_silence: Duration) -> Vec<SessionId> {
        let stale: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| {
                let silence = (now - entry.value().last_ping)
                    .to_std()
                    .unwrap_or_default();
                silence > max_silence || entry.value().sender.is_closed()
            })
            .map(|entry| entry.key().clone())
            .collect();

        stale
            .iter()
            .filter_map(|id| {
                let session = self.unregister(id)?;
                info!("Cleaning up stale connection: {session}");
                Some(session)
            })
            .collect()
    }

    pub fn summaries(&self, now: DateTime<Utc>) -> Vec<ClientSummary> {
        self.connections
            .iter()
            .map(|entry| {
                let info = entry.value();
                ClientSummary {
                    id: info.session_id.clone(),
                    page: info.page,
                    connected_for: (now - info.connected_at).num_milliseconds(),
                    last_ping: (now - info.last_ping).num_milliseconds(),
                }
            })
            .collect()
    }

    pub fn clients_by_page(&self) -> BTreeMap<Page, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.connections.iter() {
            *counts.entry(entry.value().page).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
