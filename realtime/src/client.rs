//! The explicit context object: build once at startup, spawn, pass the handle around.

use crate::broadcast::{BroadcastRoute, HttpBroadcaster, OneShotSender};
use crate::collaborators::{CredentialProvider, LogPresentation, NoCredential, Presentation};
use crate::config::SyncConfig;
use crate::dispatcher::{HandlerError, HandlerRegistry, UpdateHandler};
use crate::error::{stopped, Error};
use crate::manager::{Command, ConnectionInfo, ConnectionManager};
use crate::transport::{Connector, NetworkConnector};
use events::{Category, OriginId, Update, UpdateKind};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 32;

pub struct SyncClientBuilder {
    config: SyncConfig,
    session: Option<OriginId>,
    handlers: HandlerRegistry,
    connector: Option<Arc<dyn Connector>>,
    one_shot: Option<Arc<dyn OneShotSender>>,
    credentials: Arc<dyn CredentialProvider>,
    presentation: Arc<dyn Presentation>,
}

impl SyncClientBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            session: None,
            handlers: HandlerRegistry::new(),
            connector: None,
            one_shot: None,
            credentials: Arc::new(NoCredential),
            presentation: Arc::new(LogPresentation),
        }
    }

    /// Use a fixed session id instead of generating one.
    pub fn session(mut self, session: OriginId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn on_update<F>(mut self, category: Category, handler: F) -> Self
    where
        F: Fn(&Update) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.register(category, Arc::new(handler));
        self
    }

    pub fn handler(mut self, category: Category, handler: Arc<dyn UpdateHandler>) -> Self {
        self.handlers.register(category, handler);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn one_shot(mut self, one_shot: Arc<dyn OneShotSender>) -> Self {
        self.one_shot = Some(one_shot);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn presentation(mut self, presentation: Arc<dyn Presentation>) -> Self {
        self.presentation = presentation;
        self
    }

    /// Fails when an interval is zero or the relay URL is unusable for the default
    /// network pieces.
    pub fn build(self) -> Result<SyncClient, Error> {
        self.config.validate()?;
        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(NetworkConnector::new(
                &self.config.base_url,
                self.config.open_timeout,
            )?),
        };
        let one_shot = match self.one_shot {
            Some(one_shot) => one_shot,
            None => Arc::new(HttpBroadcaster::new(&self.config.base_url)?),
        };
        let session = self.session.unwrap_or_else(OriginId::generate);

        Ok(SyncClient {
            manager: ConnectionManager::new(
                self.config,
                session,
                self.handlers,
                connector,
                self.credentials,
                self.presentation,
                one_shot,
            ),
        })
    }
}

/// A configured client that has not started yet.
pub struct SyncClient {
    manager: ConnectionManager,
}

impl SyncClient {
    pub fn builder(config: SyncConfig) -> SyncClientBuilder {
        SyncClientBuilder::new(config)
    }

    pub fn session(&self) -> &OriginId {
        self.manager.session()
    }

    /// Connects and starts processing on a new task. Must be called within a tokio runtime.
    pub fn spawn(self) -> (SyncHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = SyncHandle {
            session: self.manager.session().clone(),
            commands: tx,
        };
        let task = tokio::spawn(self.manager.run(rx));
        (handle, task)
    }
}

/// Cheap to clone. Dropping every handle shuts the client down.
#[derive(Clone)]
pub struct SyncHandle {
    session: OriginId,
    commands: mpsc::Sender<Command>,
}

impl SyncHandle {
    pub fn session(&self) -> &OriginId {
        &self.session
    }

    async fn send(&self, command: Command) -> Result<(), Error> {
        self.commands.send(command).await.map_err(|_| stopped())
    }

    /// Announces a local change. Returns once queued; delivery is best effort.
    pub async fn announce(&self, kind: UpdateKind, data: Value) -> Result<(), Error> {
        self.send(Command::Announce {
            kind,
            data,
            reply: None,
        })
        .await
    }

    /// Like [`SyncHandle::announce`] but waits for the send attempt. `None` means it failed
    /// and was dropped.
    pub async fn announce_and_wait(
        &self,
        kind: UpdateKind,
        data: Value,
    ) -> Result<Option<BroadcastRoute>, Error> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Announce {
            kind,
            data,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn check_health(&self) -> Result<(), Error> {
        self.send(Command::CheckHealth).await
    }

    pub async fn reconnect(&self) -> Result<(), Error> {
        self.send(Command::Reconnect).await
    }

    pub async fn force_refresh(&self) -> Result<(), Error> {
        self.send(Command::ForceRefresh).await
    }

    pub async fn page_visible(&self) -> Result<(), Error> {
        self.send(Command::PageVisible).await
    }

    pub async fn connection_info(&self) -> Result<ConnectionInfo, Error> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Info(reply)).await?;
        rx.await.map_err(|_| stopped())
    }

    /// Stops the client and waits for its transport to close. Never fails: a client that
    /// already stopped is simply stopped.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Disconnect(reply)).await.is_ok() {
            let _ = rx.await;
        }
    }
}
