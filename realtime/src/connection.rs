//! The single live connection as an explicit state machine.
//!
//! Permitted transitions: `Closed -> Connecting -> Open -> Closing -> Closed`, plus
//! `Connecting -> Closed` when an open attempt fails and `Open -> Closed` when the
//! transport drops without a local close.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Server-push text stream. Receive only.
    PushStream,
    /// Full-duplex socket.
    DuplexSocket,
    None,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TransportKind::PushStream => "SSE",
            TransportKind::DuplexSocket => "WebSocket",
            TransportKind::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// The status affordance shown to the user. Cosmetic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "transport")]
pub enum ConnectionStatus {
    Connecting,
    Live(TransportKind),
    Disconnected,
    Failed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Live(kind) => write!(f, "Live ({kind})"),
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Failed => write!(f, "Connection Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid connection transition {:?} -> {:?}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    transport_kind: TransportKind,
    state: ConnectionState,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            transport_kind: TransportKind::None,
            state: ConnectionState::Closed,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport_kind
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Starts an open attempt. A failed attempt may be followed directly by a fallback
    /// attempt on another transport, so `Connecting -> Connecting` is allowed too.
    pub fn begin_connecting(&mut self, kind: TransportKind) -> Result<(), InvalidTransition> {
        self.transition(
            matches!(
                self.state,
                ConnectionState::Closed | ConnectionState::Connecting
            ),
            ConnectionState::Connecting,
        )?;
        self.transport_kind = kind;
        Ok(())
    }

    pub fn mark_open(&mut self) -> Result<(), InvalidTransition> {
        self.transition(
            self.state == ConnectionState::Connecting,
            ConnectionState::Open,
        )
    }

    pub fn begin_closing(&mut self) -> Result<(), InvalidTransition> {
        self.transition(
            matches!(
                self.state,
                ConnectionState::Open | ConnectionState::Connecting
            ),
            ConnectionState::Closing,
        )
    }

    /// Always permitted; closing an already closed connection is a no-op.
    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
        self.transport_kind = TransportKind::None;
    }

    fn transition(&mut self, allowed: bool, to: ConnectionState) -> Result<(), InvalidTransition> {
        if !allowed {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}
