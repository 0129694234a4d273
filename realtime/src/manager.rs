//! The connection manager: one task, one transport, every lifecycle event in one place.
//!
//! [`ConnectionManager::run`] is a `select!` loop over the retry timer, commands from
//! [`crate::SyncHandle`], inbound frames, the outbound ping timer and the health check
//! interval. Every transition happens on this task, so handlers for one update always
//! finish before the next frame is read.

use crate::broadcast::{BroadcastClient, BroadcastRoute, OneShotSender};
use crate::collaborators::{CredentialProvider, Presentation};
use crate::config::SyncConfig;
use crate::connection::{Connection, ConnectionState, ConnectionStatus, TransportKind};
use crate::dispatcher::{Dispatch, HandlerRegistry, Parsed, UpdateDispatcher};
use crate::error::Error;
use crate::heartbeat::HeartbeatMonitor;
use crate::reconnect::{ReconnectDecision, ReconnectionPolicy};
use crate::transport::{ConnectParams, Connector, Frame, Transport};
use chrono::Utc;
use events::{ControlMessage, OriginId, Page, Update, UpdateKind};
use log::*;
use serde::Serialize;
use serde_json::{json, Value};
use std::future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};

pub const RELOAD_MESSAGE: &str = "Live updates are not available. You may need to refresh manually to see changes from other users.";

/// Requests from [`crate::SyncHandle`] to the manager task.
#[derive(Debug)]
pub(crate) enum Command {
    Announce {
        kind: UpdateKind,
        data: Value,
        reply: Option<oneshot::Sender<Option<BroadcastRoute>>>,
    },
    CheckHealth,
    Reconnect,
    ForceRefresh,
    PageVisible,
    Info(oneshot::Sender<ConnectionInfo>),
    Disconnect(oneshot::Sender<()>),
}

/// Point-in-time view of the client, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub is_connected: bool,
    pub connection_type: TransportKind,
    pub state: ConnectionState,
    pub user_id: String,
    pub current_page: Page,
    pub reconnect_attempts: u32,
    pub failed: bool,
    pub history_len: usize,
}

enum Event {
    RetryDue,
    Inbound(Option<Result<Frame, Error>>),
    Command(Option<Command>),
    Ping,
    HealthCheck,
}

pub struct ConnectionManager {
    config: SyncConfig,
    session: OriginId,
    connection: Connection,
    transport: Option<Box<dyn Transport>>,
    preferred: TransportKind,
    policy: ReconnectionPolicy,
    heartbeat: HeartbeatMonitor,
    dispatcher: UpdateDispatcher,
    broadcaster: BroadcastClient,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    presentation: Arc<dyn Presentation>,
    retry_at: Option<Instant>,
    next_ping: Option<Instant>,
    reload_requested: bool,
    shut_down: bool,
}

impl ConnectionManager {
    pub fn new(
        config: SyncConfig,
        session: OriginId,
        handlers: HandlerRegistry,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialProvider>,
        presentation: Arc<dyn Presentation>,
        one_shot: Arc<dyn OneShotSender>,
    ) -> Self {
        let dispatcher = UpdateDispatcher::with_registry(
            session.clone(),
            config.page,
            config.history_capacity,
            handlers,
        );
        let broadcaster = BroadcastClient::new(session.clone(), config.page, one_shot);

        Self {
            preferred: config.preferred_transport,
            policy: ReconnectionPolicy::new(
                config.reconnect_base_delay,
                config.max_reconnect_attempts,
            ),
            heartbeat: HeartbeatMonitor::new(
                config.heartbeat_interval,
                config.health_check_interval,
                config.stale_after,
            ),
            connection: Connection::new(),
            transport: None,
            dispatcher,
            broadcaster,
            connector,
            credentials,
            presentation,
            retry_at: None,
            next_ping: None,
            reload_requested: false,
            shut_down: false,
            session,
            config,
        }
    }

    pub fn session(&self) -> &OriginId {
        &self.session
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn policy(&self) -> &ReconnectionPolicy {
        &self.policy
    }

    pub fn dispatcher(&self) -> &UpdateDispatcher {
        &self.dispatcher
    }

    /// When the scheduled retry fires, if one is scheduled.
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Drives the manager until [`Command::Disconnect`] arrives or every handle is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.connect(self.preferred).await;

        let period = self.heartbeat.health_check_interval();
        let mut health = time::interval_at(Instant::now() + period, period);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.shut_down {
            let event = tokio::select! {
                biased;
                _ = wait_until(self.retry_at) => Event::RetryDue,
                command = commands.recv() => Event::Command(command),
                frame = next_frame(&mut self.transport) => Event::Inbound(frame),
                _ = wait_until(self.next_ping) => Event::Ping,
                _ = health.tick() => Event::HealthCheck,
            };

            match event {
                Event::RetryDue => self.retry_due().await,
                Event::Inbound(Some(Ok(frame))) => self.on_message(frame),
                Event::Inbound(Some(Err(e))) => self.on_close(Some(e)).await,
                Event::Inbound(None) => self.on_close(None).await,
                Event::Command(Some(command)) => self.handle_command(command).await,
                Event::Command(None) => {
                    debug!("All handles dropped, shutting down live updates");
                    self.disconnect().await;
                }
                Event::Ping => self.send_heartbeat().await,
                Event::HealthCheck => self.check_staleness().await,
            }
        }

        debug!("Live update task for {} finished", self.session);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Announce { kind, data, reply } => {
                let route = self.announce(kind, data).await;
                if let Some(reply) = reply {
                    let _ = reply.send(route);
                }
            }
            Command::CheckHealth => self.check_health().await,
            Command::Reconnect => self.reconnect().await,
            Command::ForceRefresh => self.force_refresh(),
            Command::PageVisible => self.page_visible(),
            Command::Info(reply) => {
                let _ = reply.send(self.info());
            }
            Command::Disconnect(reply) => {
                self.disconnect().await;
                let _ = reply.send(());
            }
        }
    }

    /// Replaces any current transport with a new one of the preferred kind. A push stream
    /// that fails to open is retried as a duplex socket, once.
    pub async fn connect(&mut self, preferred: TransportKind) -> Option<TransportKind> {
        if self.shut_down {
            return None;
        }

        self.teardown().await;
        self.retry_at = None;
        self.preferred = preferred;
        self.policy.begin_attempt();
        self.presentation
            .set_connection_status(ConnectionStatus::Connecting);

        let params = ConnectParams {
            user_id: self.session.clone(),
            page: self.config.page,
            timestamp: Utc::now(),
            token: current_credential(self.credentials.as_ref()).await,
        };
        let mut last_error = None;

        for &kind in attempt_order(preferred) {
            if let Err(e) = self.connection.begin_connecting(kind) {
                warn!("{e}");
            }
            info!("Connecting to {kind} for user: {}", self.session);

            match self.connector.open(kind, &params).await {
                Ok(transport) => {
                    self.on_open(transport);
                    return Some(kind);
                }
                Err(e) => {
                    warn!("Failed to open {kind} connection: {e}");
                    last_error = Some(e);
                }
            }
        }

        self.on_close(last_error).await;
        None
    }

    pub fn on_open(&mut self, transport: Box<dyn Transport>) {
        let kind = transport.kind();
        if let Err(e) = self.connection.mark_open() {
            warn!("{e}");
        }

        self.transport = Some(transport);
        self.policy.on_open();
        self.reload_requested = false;

        let now = Instant::now();
        self.heartbeat.start(now);
        self.next_ping = Some(now + self.heartbeat.ping_interval());

        info!("{kind} connection established");
        self.presentation
            .set_connection_status(ConnectionStatus::Live(kind));
    }

    /// Hands one inbound frame to the dispatcher. Nothing here can fail the connection.
    pub fn on_message(&mut self, frame: Frame) {
        self.heartbeat.record_inbound(Instant::now());

        let data = match frame {
            Frame::Text { data, .. } => data,
            Frame::KeepAlive => {
                trace!("Keep-alive received");
                return;
            }
        };

        match self.dispatcher.parse(&data, self.connection.transport_kind()) {
            Parsed::Update(update) => self.deliver(update),
            Parsed::Control(control) => self.on_control(control),
            Parsed::Drop(_) => {}
        }
    }

    fn deliver(&mut self, update: Update) {
        let invalidates = matches!(update.kind, UpdateKind::CacheInvalidate(_));

        if let Dispatch::Delivered(delivery) = self.dispatcher.dispatch(update) {
            if delivery.handler_failures > 0 {
                debug!(
                    "{} of {} handlers failed for {}",
                    delivery.handler_failures, delivery.handlers_run, delivery.kind
                );
            }
            if let Some(notice) = &delivery.notice {
                self.presentation.show_transient_notice(notice);
            }
            if invalidates {
                info!("Cache invalidated ({}), refreshing page data", delivery.kind);
                self.presentation.refresh_page_data(self.config.page);
            }
        }
    }

    fn on_control(&mut self, control: ControlMessage) {
        match &control {
            ControlMessage::Connected {
                connected_clients, ..
            } => {
                info!("Relay greeting received, {connected_clients} clients connected");
            }
            ControlMessage::Heartbeat { .. } => trace!("Heartbeat received"),
            ControlMessage::ForceRefresh { message, .. } => {
                if control.refreshes(self.config.page) {
                    if let Some(message) = message {
                        self.presentation.show_transient_notice(message);
                    }
                    self.presentation.refresh_page_data(self.config.page);
                }
            }
        }
    }

    /// A failed open, a transport error or an unexpected close.
    pub async fn on_close(&mut self, error: Option<Error>) {
        self.teardown().await;

        match &error {
            Some(e) => warn!("Connection to relay lost: {e}"),
            None => info!("Connection to relay closed"),
        }

        if self.shut_down {
            return;
        }

        match self.policy.on_failure() {
            ReconnectDecision::Retry { delay, attempt } => {
                info!(
                    "Reconnecting in {}ms (attempt {attempt}/{})",
                    delay.as_millis(),
                    self.config.max_reconnect_attempts
                );
                self.retry_at = Some(Instant::now() + delay);
                self.presentation
                    .set_connection_status(ConnectionStatus::Disconnected);
            }
            ReconnectDecision::GiveUp => {
                error!("Max reconnection attempts reached");
                self.retry_at = None;
                self.presentation
                    .set_connection_status(ConnectionStatus::Failed);
                if !self.reload_requested {
                    self.reload_requested = true;
                    self.presentation.request_reload(RELOAD_MESSAGE);
                }
            }
        }
    }

    async fn retry_due(&mut self) {
        self.retry_at = None;
        if self.shut_down || self.policy.is_failed() {
            return;
        }
        self.connect(self.preferred).await;
    }

    /// Explicit shutdown. Safe in every state; nothing reconnects afterwards.
    pub async fn disconnect(&mut self) {
        info!("Disconnecting real-time updates");
        self.shut_down = true;
        self.retry_at = None;
        self.policy.cancel();
        self.teardown().await;
        self.presentation
            .set_connection_status(ConnectionStatus::Disconnected);
    }

    async fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = self.connection.begin_closing() {
                debug!("{e}");
            }
            transport.close().await;
        }
        self.connection.mark_closed();
        self.heartbeat.stop();
        self.next_ping = None;
    }

    /// Reconnects only when the transport is gone or reports itself closed. An idle but
    /// healthy transport is left alone.
    pub async fn check_health(&mut self) {
        if self.shut_down || self.policy.is_failed() {
            return;
        }

        let healthy = self.transport.as_ref().map(|transport| transport.is_healthy());
        match healthy {
            Some(true) => debug!("Connection idle but healthy"),
            Some(false) => {
                info!("Transport reports closed, reconnecting");
                self.on_close(None).await;
            }
            None if self.retry_at.is_none() => {
                info!("Connection lost, attempting to reconnect");
                self.connect(self.preferred).await;
            }
            None => {}
        }
    }

    async fn check_staleness(&mut self) {
        let now = Instant::now();
        if self.heartbeat.is_stale(now) {
            warn!(
                "No updates received for {}s, checking connection",
                self.heartbeat.since_last_inbound(now).as_secs()
            );
            self.check_health().await;
        }
    }

    async fn send_heartbeat(&mut self) {
        if !self.connection.is_open() {
            self.next_ping = None;
            return;
        }
        self.next_ping = Some(Instant::now() + self.heartbeat.ping_interval());

        let data = json!({ "page": self.config.page });
        self.broadcaster
            .announce(self.transport.as_mut(), UpdateKind::Heartbeat, data)
            .await;
    }

    pub async fn announce(&mut self, kind: UpdateKind, data: Value) -> Option<BroadcastRoute> {
        self.broadcaster
            .announce(self.transport.as_mut(), kind, data)
            .await
    }

    /// Manual reconnect. Clears the failure streak, including a terminal failure.
    pub async fn reconnect(&mut self) {
        info!("Manual reconnect requested");
        self.policy.reset();
        self.reload_requested = false;
        self.connect(self.config.preferred_transport).await;
    }

    pub fn force_refresh(&self) {
        self.presentation.refresh_page_data(self.config.page);
    }

    /// The page came back into view: catch up on anything missed while hidden.
    pub fn page_visible(&self) {
        if self.connection.is_open() {
            info!("Page visible, refreshing data");
            self.presentation.refresh_page_data(self.config.page);
        }
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            is_connected: self.connection.is_open(),
            connection_type: self.connection.transport_kind(),
            state: self.connection.state(),
            user_id: self.session.to_string(),
            current_page: self.config.page,
            reconnect_attempts: self.policy.attempt_count(),
            failed: self.policy.is_failed(),
            history_len: self.dispatcher.history().len(),
        }
    }
}

/// A failed lookup is the same as being signed out.
async fn current_credential(credentials: &dyn CredentialProvider) -> Option<String> {
    match credentials.current_credential().await {
        Ok(token) => token,
        Err(e) => {
            warn!("Could not get credential, connecting without one: {e}");
            None
        }
    }
}

fn attempt_order(preferred: TransportKind) -> &'static [TransportKind] {
    match preferred {
        TransportKind::DuplexSocket => &[TransportKind::DuplexSocket],
        TransportKind::PushStream | TransportKind::None => {
            &[TransportKind::PushStream, TransportKind::DuplexSocket]
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn next_frame(transport: &mut Option<Box<dyn Transport>>) -> Option<Result<Frame, Error>> {
    match transport {
        Some(transport) => transport.next_frame().await,
        None => future::pending().await,
    }
}
