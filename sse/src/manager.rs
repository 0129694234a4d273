use crate::connection::{ClientSummary, ConnectionId, ConnectionRegistry, SessionId};
use crate::message::OutboundFrame;
use chrono::Utc;
use events::{decode_inbound, ControlMessage, DecodeError, Inbound, Page, WireUpdate};
use log::*;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Updates kept for replay to newly connected clients.
pub const RECENT_CAPACITY: usize = 50;
/// How many of the most recent updates a new client is sent.
pub const REPLAY_LIMIT: usize = 10;
/// Connections silent for longer than this are dropped by the heartbeat sweep.
pub const STALE_AFTER: Duration = Duration::from_secs(60);

const DEFAULT_REFRESH_MESSAGE: &str = "Server requested refresh";

/// What the relay did with one inbound client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// An update, forwarded to this many other connections.
    Published(usize),
    /// A client heartbeat.
    Touched,
    /// A control message clients are not expected to send.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatReport {
    pub connected_clients: usize,
    pub active_clients: Vec<ClientSummary>,
    pub recent_updates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub connected_clients: usize,
    pub recent_updates: usize,
    pub clients_by_page: BTreeMap<Page, usize>,
    /// Seconds since the relay started.
    pub uptime: u64,
}

/// Routes updates between connected clients.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    recent: Mutex<VecDeque<WireUpdate>>,
    stale_after: Duration,
    started_at: Instant,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_stale_after(STALE_AFTER)
    }

    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)),
            stale_after,
            started_at: Instant::now(),
        }
    }

    pub fn register_connection(
        &self,
        session_id: SessionId,
        page: Page,
        sender: UnboundedSender<OutboundFrame>,
    ) -> ConnectionId {
        info!("Client connected: {session_id} on page {page}");
        self.registry.register(session_id, page, sender)
    }

    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        if let Some(session_id) = self.registry.unregister(connection_id) {
            info!("Client disconnected: {session_id}");
        }
    }

    pub fn connected_clients(&self) -> usize {
        self.registry.len()
    }

    /// The first frame every new connection receives.
    pub fn greeting(&self, session_id: &str) -> Result<OutboundFrame, serde_json::Error> {
        OutboundFrame::from_event(&ControlMessage::Connected {
            user_id: Some(session_id.to_string()),
            timestamp: Utc::now(),
            connected_clients: self.registry.len(),
        })
    }

    /// Stores the update for replay and forwards it to every connection not belonging to
    /// its origin. Returns how many connections it reached.
    pub fn publish(&self, update: WireUpdate) -> usize {
        let frame = match OutboundFrame::from_event(&update) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize update: {e}");
                return 0;
            }
        };

        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if recent.len() == RECENT_CAPACITY {
                recent.pop_front();
            }
            recent.push_back(update.clone());
        }

        let delivered = self
            .registry
            .send_to_all_except(update.origin_id.as_str(), &frame);
        debug!(
            "Broadcast {} from {} to {delivered} client(s)",
            update.kind, update.origin_id
        );
        delivered
    }

    /// The newest `limit` updates, minus those `session_id` sent itself. Newest first.
    pub fn recent_for(&self, session_id: &str, limit: usize) -> Vec<WireUpdate> {
        let mut recent: Vec<WireUpdate> = self
            .recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.emitted_at.cmp(&a.emitted_at));
        recent.truncate(limit);
        recent.retain(|update| update.origin_id.as_str() != session_id);
        recent
    }

    pub fn recent_len(&self) -> usize {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Handles a message a client sent, over its socket or to the broadcast endpoint.
    pub fn receive(&self, raw: &str) -> Result<Received, DecodeError> {
        match decode_inbound(raw)? {
            Inbound::Update(update) => Ok(Received::Published(self.publish(update))),
            Inbound::Control(ControlMessage::Heartbeat { user_id, .. }) => {
                if let Some(session_id) = user_id {
                    self.registry.touch(&session_id, Utc::now());
                }
                Ok(Received::Touched)
            }
            Inbound::Control(other) => {
                debug!("Ignoring client-sent {:?}", other);
                Ok(Received::Ignored)
            }
        }
    }

    /// Drops stale connections and pings the rest.
    pub fn heartbeat(&self) -> HeartbeatReport {
        let now = Utc::now();
        self.registry.sweep_stale(now, self.stale_after);
        let active_clients = self.registry.summaries(now);

        let ping = ControlMessage::Heartbeat {
            user_id: None,
            timestamp: now,
            connected_clients: self.registry.len(),
        };
        match OutboundFrame::from_event(&ping) {
            Ok(frame) => {
                self.registry.broadcast(&frame);
            }
            Err(e) => error!("Failed to serialize heartbeat: {e}"),
        }

        HeartbeatReport {
            connected_clients: self.registry.len(),
            active_clients,
            recent_updates: self.recent_len(),
        }
    }

    /// Asks clients on `page`, or on every page when `None`, to reload their data.
    pub fn force_refresh(&self, page: Option<Page>, message: Option<String>) -> usize {
        let refresh = ControlMessage::ForceRefresh {
            page: Some(page.map_or("all", |page| page.as_str()).to_string()),
            message: Some(message.unwrap_or_else(|| DEFAULT_REFRESH_MESSAGE.to_string())),
            timestamp: Utc::now(),
        };
        let frame = match OutboundFrame::from_event(&refresh) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize refresh request: {e}");
                return 0;
            }
        };

        let refreshed = self
            .registry
            .send_where(&frame, |info| page.map_or(true, |page| info.page == page));
        info!("Force refresh sent to {refreshed} client(s)");
        refreshed
    }

    pub fn stats(&self) -> Stats {
        Stats {
            connected_clients: self.registry.len(),
            recent_updates: self.recent_len(),
            clients_by_page: self.registry.clients_by_page(),
            uptime: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
