use super::Frame;
use crate::connection::TransportKind;
use crate::error::{transport_error, Error, ErrorKind, TransportErrorKind};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::*;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport. Open once the upgrade handshake completes.
pub struct DuplexSocketTransport {
    socket: WsStream,
    closed: bool,
}

impl DuplexSocketTransport {
    pub async fn open(url: &Url, open_timeout: Duration) -> Result<Self, Error> {
        debug!("Opening WebSocket to {}", url.path());

        let (socket, _) = tokio::time::timeout(open_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                transport_error(
                    TransportErrorKind::OpenTimeout,
                    "WebSocket handshake timed out",
                )
            })?
            .map_err(|e| Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::Transport(TransportErrorKind::OpenFailed),
            })?;

        Ok(Self {
            socket,
            closed: false,
        })
    }
}

#[async_trait]
impl super::Transport for DuplexSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::DuplexSocket
    }

    fn supports_send(&self) -> bool {
        true
    }

    fn is_healthy(&self) -> bool {
        !self.closed
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, Error>> {
        if self.closed {
            return None;
        }

        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(Ok(Frame::Text {
                        data: text.as_str().to_owned(),
                        event_type: None,
                    }))
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return Some(Ok(Frame::Text {
                        data: String::from_utf8_lossy(&bytes).into_owned(),
                        event_type: None,
                    }))
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    return Some(Ok(Frame::KeepAlive))
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("WebSocket closed by server: {frame:?}");
                    self.closed = true;
                    return None;
                }
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    self.closed = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), Error> {
        if self.closed {
            return Err(transport_error(
                TransportErrorKind::Closed,
                "WebSocket is closed",
            ));
        }

        self.socket.send(Message::text(text)).await.map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Transport(TransportErrorKind::Send),
        })
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.socket.close(None).await {
            debug!("WebSocket close did not complete cleanly: {e}");
        }
    }
}
