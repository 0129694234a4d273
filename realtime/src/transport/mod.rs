//! One interface over the two transports.
//!
//! The connection manager, dispatcher and reconnection policy are written against
//! [`Transport`] and [`Connector`] only. Implementations:
//!
//! - `push_stream`: SSE via `eventsource-client`, receive only
//! - `duplex_socket`: WebSocket via `tokio-tungstenite`
//! - `network`: the [`Connector`] that builds either from the relay base URL

use crate::connection::TransportKind;
use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use events::{OriginId, Page};
use url::Url;

pub mod duplex_socket;
pub mod network;
pub mod push_stream;

pub use network::NetworkConnector;

/// One unit of inbound traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text {
        data: String,
        /// The SSE event name, when the transport has one.
        event_type: Option<String>,
    },
    /// Keep-alive comment or ping. Counts as liveness, carries nothing.
    KeepAlive,
}

impl Frame {
    pub fn text(data: impl Into<String>) -> Self {
        Frame::Text {
            data: data.into(),
            event_type: None,
        }
    }
}

/// Handshake parameters sent as the query string of either transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectParams {
    pub user_id: OriginId,
    pub page: Page,
    /// Freshness marker so intermediaries never serve a cached stream.
    pub timestamp: DateTime<Utc>,
    /// Opaque short-lived credential. Attached as-is, never inspected.
    pub token: Option<String>,
}

impl ConnectParams {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("userId", self.user_id.to_string()),
            ("page", self.page.to_string()),
            ("timestamp", self.timestamp.timestamp_millis().to_string()),
        ];
        if let Some(token) = &self.token {
            pairs.push(("token", token.clone()));
        }
        pairs
    }

    pub fn apply_to(&self, url: &mut Url) {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(self.query_pairs());
    }
}

/// A live transport, exclusively owned by the connection manager.
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Whether client to server messages can be sent over this transport.
    fn supports_send(&self) -> bool;

    /// Whether the transport still considers itself connected. An idle but healthy
    /// transport reports `true`.
    fn is_healthy(&self) -> bool;

    /// The next inbound frame, `Some(Err)` on a transport error, `None` once closed.
    /// Must be cancel safe: the manager drops this future whenever another event wins.
    async fn next_frame(&mut self) -> Option<Result<Frame, Error>>;

    async fn send(&mut self, text: String) -> Result<(), Error>;

    /// Releases the underlying stream or socket. Never fails.
    async fn close(&mut self);
}

/// Opens transports. Returns only once the transport has completed its handshake.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        kind: TransportKind,
        params: &ConnectParams,
    ) -> Result<Box<dyn Transport>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(token: Option<&str>) -> ConnectParams {
        ConnectParams {
            user_id: OriginId::new("user_1_abc").unwrap(),
            page: Page::Events,
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            token: token.map(str::to_string),
        }
    }

    #[test]
    fn query_carries_identity_page_and_freshness() {
        let mut url = Url::parse("http://localhost:3000/api/sse/updates").unwrap();
        params(None).apply_to(&mut url);

        assert_eq!(
            url.query(),
            Some("userId=user_1_abc&page=events&timestamp=1700000000000")
        );
    }

    #[test]
    fn token_is_attached_only_when_present() {
        let pairs = params(Some("abc.def")).query_pairs();
        assert_eq!(pairs.last(), Some(&("token", "abc.def".to_string())));
        assert!(params(None).query_pairs().iter().all(|(k, _)| *k != "token"));
    }
}
