use super::Frame;
use crate::connection::TransportKind;
use crate::error::{transport_error, Error, ErrorKind, TransportErrorKind};
use async_trait::async_trait;
use eventsource_client::{self as es, Client};
use futures_util::stream::{Stream, StreamExt};
use log::*;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

type EventStream = Pin<Box<dyn Stream<Item = Result<es::SSE, es::Error>> + Send>>;

/// SSE transport. The stream counts as open once it has produced its first frame,
/// which the relay sends immediately as a `connection` greeting.
pub struct PushStreamTransport {
    stream: EventStream,
    pending: Option<Frame>,
    ended: bool,
}

impl PushStreamTransport {
    pub async fn open(url: &Url, open_timeout: Duration) -> Result<Self, Error> {
        debug!("Opening SSE stream to {}", url.path());

        // Reconnection is ours to decide, never the client library's.
        let client = es::ClientBuilder::for_url(url.as_str())?
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        let mut stream: EventStream = Box::pin(client.stream());

        let first = tokio::time::timeout(open_timeout, stream.next())
            .await
            .map_err(|_| {
                transport_error(
                    TransportErrorKind::OpenTimeout,
                    "SSE stream produced no handshake in time",
                )
            })?;

        let pending = match first {
            Some(Ok(sse)) => into_frame(sse),
            Some(Err(e)) => {
                return Err(Error {
                    source: Some(Box::new(e)),
                    error_kind: ErrorKind::Transport(TransportErrorKind::OpenFailed),
                })
            }
            None => {
                return Err(transport_error(
                    TransportErrorKind::OpenFailed,
                    "SSE stream ended before opening",
                ))
            }
        };

        Ok(Self {
            stream,
            pending: Some(pending),
            ended: false,
        })
    }
}

fn into_frame(sse: es::SSE) -> Frame {
    match sse {
        es::SSE::Event(event) => Frame::Text {
            data: event.data,
            event_type: Some(event.event_type),
        },
        // Comments are the relay's keep-alives.
        es::SSE::Comment(_) => Frame::KeepAlive,
        #[allow(unreachable_patterns)]
        _ => Frame::KeepAlive,
    }
}

#[async_trait]
impl super::Transport for PushStreamTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::PushStream
    }

    fn supports_send(&self) -> bool {
        false
    }

    fn is_healthy(&self) -> bool {
        !self.ended
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, Error>> {
        if let Some(frame) = self.pending.take() {
            return Some(Ok(frame));
        }
        if self.ended {
            return None;
        }

        match self.stream.next().await {
            Some(Ok(sse)) => Some(Ok(into_frame(sse))),
            Some(Err(e)) => {
                self.ended = true;
                Some(Err(e.into()))
            }
            None => {
                self.ended = true;
                None
            }
        }
    }

    async fn send(&mut self, _text: String) -> Result<(), Error> {
        Err(transport_error(
            TransportErrorKind::SendUnsupported,
            "SSE streams are receive only",
        ))
    }

    async fn close(&mut self) {
        // Dropping the stream closes the underlying HTTP response.
        self.ended = true;
        self.pending = None;
        self.stream = Box::pin(futures_util::stream::empty());
    }
}
