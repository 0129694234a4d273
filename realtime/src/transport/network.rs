use super::duplex_socket::DuplexSocketTransport;
use super::push_stream::PushStreamTransport;
use super::{ConnectParams, Connector, Transport};
use crate::connection::TransportKind;
use crate::error::{transport_error, Error, TransportErrorKind};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

pub const PUSH_STREAM_PATH: &str = "/api/sse/updates";
pub const DUPLEX_SOCKET_PATH: &str = "/ws/updates";

/// Opens real network transports against a relay.
pub struct NetworkConnector {
    base_url: Url,
    open_timeout: Duration,
}

impl NetworkConnector {
    pub fn new(base_url: &str, open_timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            open_timeout,
        })
    }

    pub fn push_stream_url(&self, params: &ConnectParams) -> Result<Url, Error> {
        let mut url = self.base_url.join(PUSH_STREAM_PATH)?;
        params.apply_to(&mut url);
        Ok(url)
    }

    pub fn duplex_socket_url(&self, params: &ConnectParams) -> Result<Url, Error> {
        let mut url = self.base_url.join(DUPLEX_SOCKET_PATH)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|_| {
            transport_error(
                TransportErrorKind::InvalidUrl,
                "relay URL cannot be used for WebSockets",
            )
        })?;
        params.apply_to(&mut url);
        Ok(url)
    }
}

#[async_trait]
impl Connector for NetworkConnector {
    async fn open(
        &self,
        kind: TransportKind,
        params: &ConnectParams,
    ) -> Result<Box<dyn Transport>, Error> {
        match kind {
            TransportKind::PushStream => {
                let url = self.push_stream_url(params)?;
                Ok(Box::new(
                    PushStreamTransport::open(&url, self.open_timeout).await?,
                ))
            }
            TransportKind::DuplexSocket => {
                let url = self.duplex_socket_url(params)?;
                Ok(Box::new(
                    DuplexSocketTransport::open(&url, self.open_timeout).await?,
                ))
            }
            TransportKind::None => Err(transport_error(
                TransportErrorKind::OpenFailed,
                "no transport requested",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use events::{OriginId, Page};

    fn params() -> ConnectParams {
        ConnectParams {
            user_id: OriginId::new("user_9_q").unwrap(),
            page: Page::Dashboard,
            timestamp: Utc::now(),
            token: None,
        }
    }

    #[test]
    fn builds_push_stream_url() {
        let connector =
            NetworkConnector::new("https://admin.example.org", Duration::from_secs(1)).unwrap();
        let url = connector.push_stream_url(&params()).unwrap();

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.path(), "/api/sse/updates");
        assert!(url.query().unwrap().starts_with("userId=user_9_q&page=dashboard"));
    }

    #[test]
    fn socket_url_switches_scheme() {
        let secure =
            NetworkConnector::new("https://admin.example.org", Duration::from_secs(1)).unwrap();
        let plain = NetworkConnector::new("http://localhost:3000", Duration::from_secs(1)).unwrap();

        assert_eq!(secure.duplex_socket_url(&params()).unwrap().scheme(), "wss");
        let url = plain.duplex_socket_url(&params()).unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.path(), "/ws/updates");
        assert_eq!(url.port(), Some(3000));
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(NetworkConnector::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn refuses_to_open_no_transport() {
        let connector =
            NetworkConnector::new("http://localhost:3000", Duration::from_secs(1)).unwrap();
        assert!(connector.open(TransportKind::None, &params()).await.is_err());
    }
}
