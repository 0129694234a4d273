//! Error types for the `realtime` crate.
//!
//! Follows the same pattern as the other workspace crates: a root `Error` struct holding
//! an error kind tree and an optional source for chaining. None of these errors ever
//! reach the end user; the connection manager recovers from all of them.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the live update client.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Transport(TransportErrorKind),
    Broadcast(BroadcastErrorKind),
    Credential,
    Config,
    /// The client task has stopped and no longer accepts commands.
    Stopped,
}

/// Errors from opening, reading or writing a transport.
#[derive(Debug, PartialEq)]
pub enum TransportErrorKind {
    InvalidUrl,
    OpenFailed,
    OpenTimeout,
    Stream,
    Send,
    /// The transport only carries server to client traffic.
    SendUnsupported,
    Closed,
}

/// Errors from the one-shot broadcast request.
#[derive(Debug, PartialEq)]
pub enum BroadcastErrorKind {
    Serialize,
    Request,
    Rejected(u16),
}

impl Error {
    pub fn is_transport(&self) -> bool {
        matches!(self.error_kind, ErrorKind::Transport(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Transport(kind) => write!(f, "Transport error: {kind:?}")?,
            ErrorKind::Broadcast(kind) => write!(f, "Broadcast error: {kind:?}")?,
            ErrorKind::Credential => write!(f, "Credential error")?,
            ErrorKind::Config => write!(f, "Configuration error")?,
            ErrorKind::Stopped => write!(f, "Live update client stopped")?,
        }
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Transport(TransportErrorKind::InvalidUrl),
        }
    }
}

impl From<eventsource_client::Error> for Error {
    fn from(err: eventsource_client::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Transport(TransportErrorKind::Stream),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Transport(TransportErrorKind::Stream),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Builder errors happen before any network call is made.
        let error_kind = if err.is_builder() {
            ErrorKind::Config
        } else {
            ErrorKind::Broadcast(BroadcastErrorKind::Request)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Broadcast(BroadcastErrorKind::Serialize),
        }
    }
}

/// Helper function to create transport errors.
pub fn transport_error(kind: TransportErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Transport(kind),
    }
}

/// Helper function to create broadcast errors.
pub fn broadcast_error(kind: BroadcastErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Broadcast(kind),
    }
}

/// Helper function to create credential errors.
pub fn credential_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Credential,
    }
}

/// Helper function to create configuration errors.
pub fn config_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config,
    }
}

pub(crate) fn stopped() -> Error {
    Error {
        source: None,
        error_kind: ErrorKind::Stopped,
    }
}
