//! Outbound announcements of local changes.
//!
//! A duplex transport carries announcements itself. A receive-only push stream cannot, so
//! those go out as one-shot HTTP POSTs to the relay's broadcast endpoint.

use crate::error::{broadcast_error, BroadcastErrorKind, Error};
use crate::transport::Transport;
use async_trait::async_trait;
use events::{OriginId, Page, Update, UpdateKind, WireUpdate};
use log::*;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub const BROADCAST_PATH: &str = "/api/sse/broadcast";

/// Sends a single update to the relay outside of any open transport.
#[async_trait]
pub trait OneShotSender: Send + Sync {
    async fn send(&self, update: &WireUpdate) -> Result<(), Error>;
}

/// POSTs updates to the relay with `reqwest`.
pub struct HttpBroadcaster {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpBroadcaster {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint: Url::parse(base_url)?.join(BROADCAST_PATH)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl OneShotSender for HttpBroadcaster {
    async fn send(&self, update: &WireUpdate) -> Result<(), Error> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(update)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(broadcast_error(
                BroadcastErrorKind::Rejected(status.as_u16()),
                &format!("relay answered {status}"),
            ));
        }

        trace!("Broadcast {} accepted by relay", update.kind);
        Ok(())
    }
}

/// How an announcement left this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastRoute {
    Transport,
    OneShot,
}

/// Stamps local changes with this session's identity and sends them out.
pub struct BroadcastClient {
    origin: OriginId,
    page: Page,
    one_shot: Arc<dyn OneShotSender>,
}

impl BroadcastClient {
    pub fn new(origin: OriginId, page: Page, one_shot: Arc<dyn OneShotSender>) -> Self {
        Self {
            origin,
            page,
            one_shot,
        }
    }

    pub fn origin(&self) -> &OriginId {
        &self.origin
    }

    pub fn build_update(&self, kind: UpdateKind, data: Value) -> Update {
        Update::new(kind, self.origin.clone(), data).with_scope_page(self.page)
    }

    /// Sends over `transport` when it can carry client traffic, otherwise one-shot.
    pub async fn send(
        &self,
        transport: Option<&mut Box<dyn Transport>>,
        update: &Update,
    ) -> Result<BroadcastRoute, Error> {
        match transport {
            Some(transport) if transport.supports_send() => {
                transport.send(update.encode()?).await?;
                Ok(BroadcastRoute::Transport)
            }
            _ => {
                self.one_shot.send(&update.to_wire()).await?;
                Ok(BroadcastRoute::OneShot)
            }
        }
    }

    /// Fire and forget: failures are logged and the update is dropped.
    pub async fn announce(
        &self,
        transport: Option<&mut Box<dyn Transport>>,
        kind: UpdateKind,
        data: Value,
    ) -> Option<BroadcastRoute> {
        let update = self.build_update(kind, data);
        match self.send(transport, &update).await {
            Ok(route) => {
                debug!("Broadcast {kind} via {route:?}");
                Some(route)
            }
            Err(e) => {
                warn!("Failed to broadcast {kind}: {e}");
                None
            }
        }
    }
}
