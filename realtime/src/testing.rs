//! In-memory stand-ins for transports and collaborators.

use crate::broadcast::OneShotSender;
use crate::collaborators::Presentation;
use crate::connection::{ConnectionStatus, TransportKind};
use crate::error::{broadcast_error, transport_error, BroadcastErrorKind, Error, TransportErrorKind};
use crate::transport::{ConnectParams, Connector, Frame, Transport};
use async_trait::async_trait;
use events::{Page, WireUpdate};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type Inbound = Option<Result<Frame, Error>>;

#[derive(Default)]
struct TransportState {
    sent: Vec<String>,
    closed: bool,
}

pub(crate) struct MockTransport {
    kind: TransportKind,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    state: Arc<Mutex<TransportState>>,
}

/// The test's end of a [`MockTransport`].
#[derive(Clone)]
pub(crate) struct TransportProbe {
    inbound: mpsc::UnboundedSender<Inbound>,
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub(crate) fn new(kind: TransportKind) -> (Self, TransportProbe) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(TransportState::default()));
        (
            Self {
                kind,
                inbound: rx,
                state: Arc::clone(&state),
            },
            TransportProbe { inbound: tx, state },
        )
    }
}

impl TransportProbe {
    pub(crate) fn push_text(&self, raw: &str) {
        let _ = self.inbound.send(Some(Ok(Frame::text(raw))));
    }

    pub(crate) fn push_keep_alive(&self) {
        let _ = self.inbound.send(Some(Ok(Frame::KeepAlive)));
    }

    pub(crate) fn push_error(&self) {
        let _ = self.inbound.send(Some(Err(transport_error(
            TransportErrorKind::Stream,
            "connection reset",
        ))));
    }

    /// The remote end goes away.
    pub(crate) fn end(&self) {
        let _ = self.inbound.send(None);
    }

    /// The transport reports itself closed without delivering anything.
    pub(crate) fn mark_dead(&self) {
        self.state.lock().unwrap().closed = true;
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn supports_send(&self) -> bool {
        self.kind == TransportKind::DuplexSocket
    }

    fn is_healthy(&self) -> bool {
        !self.state.lock().unwrap().closed
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, Error>> {
        match self.inbound.recv().await {
            Some(Some(item)) => Some(item),
            Some(None) | None => {
                self.state.lock().unwrap().closed = true;
                None
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), Error> {
        if !self.supports_send() {
            return Err(transport_error(
                TransportErrorKind::SendUnsupported,
                "receive only",
            ));
        }
        self.state.lock().unwrap().sent.push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.state.lock().unwrap().closed = true;
    }
}

enum Outcome {
    Open(MockTransport),
    Fail,
}

/// Opens transports from a script, one entry per attempt. Attempts past the end fail.
#[derive(Default)]
pub(crate) struct MockConnector {
    script: Mutex<VecDeque<Outcome>>,
    attempts: Mutex<Vec<(TransportKind, ConnectParams)>>,
}

impl MockConnector {
    /// The next attempt succeeds; returns the probe for the transport it will open.
    pub(crate) fn will_open(&self) -> TransportProbe {
        let (transport, probe) = MockTransport::new(TransportKind::None);
        self.script
            .lock()
            .unwrap()
            .push_back(Outcome::Open(transport));
        probe
    }

    pub(crate) fn will_fail(&self) {
        self.script.lock().unwrap().push_back(Outcome::Fail);
    }

    pub(crate) fn attempts(&self) -> Vec<(TransportKind, ConnectParams)> {
        self.attempts.lock().unwrap().clone()
    }

    pub(crate) fn attempted_kinds(&self) -> Vec<TransportKind> {
        self.attempts().into_iter().map(|(kind, _)| kind).collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(
        &self,
        kind: TransportKind,
        params: &ConnectParams,
    ) -> Result<Box<dyn Transport>, Error> {
        self.attempts.lock().unwrap().push((kind, params.clone()));
        let outcome = self.script.lock().unwrap().pop_front();
        match outcome {
            Some(Outcome::Open(mut transport)) => {
                transport.kind = kind;
                Ok(Box::new(transport))
            }
            Some(Outcome::Fail) | None => Err(transport_error(
                TransportErrorKind::OpenFailed,
                "connection refused",
            )),
        }
    }
}

#[derive(Default)]
pub(crate) struct MockPresentation {
    pub(crate) notices: Mutex<Vec<String>>,
    pub(crate) statuses: Mutex<Vec<ConnectionStatus>>,
    pub(crate) reloads: Mutex<Vec<String>>,
    pub(crate) refreshes: Mutex<Vec<Page>>,
}

impl MockPresentation {
    pub(crate) fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub(crate) fn statuses(&self) -> Vec<ConnectionStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub(crate) fn last_status(&self) -> Option<ConnectionStatus> {
        self.statuses.lock().unwrap().last().copied()
    }

    pub(crate) fn reloads(&self) -> Vec<String> {
        self.reloads.lock().unwrap().clone()
    }

    pub(crate) fn refreshes(&self) -> Vec<Page> {
        self.refreshes.lock().unwrap().clone()
    }
}

impl Presentation for MockPresentation {
    fn show_transient_notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn set_connection_status(&self, status: ConnectionStatus) {
        self.statuses.lock().unwrap().push(status);
    }

    fn request_reload(&self, message: &str) {
        self.reloads.lock().unwrap().push(message.to_string());
    }

    fn refresh_page_data(&self, page: Page) {
        self.refreshes.lock().unwrap().push(page);
    }
}

#[derive(Default)]
pub(crate) struct MockOneShot {
    fail: bool,
    sent: Mutex<Vec<WireUpdate>>,
}

impl MockOneShot {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<WireUpdate> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OneShotSender for MockOneShot {
    async fn send(&self, update: &WireUpdate) -> Result<(), Error> {
        if self.fail {
            return Err(broadcast_error(BroadcastErrorKind::Request, "relay unreachable"));
        }
        self.sent.lock().unwrap().push(update.clone());
        Ok(())
    }
}
