//! Live update client core for prefect-admin.
//!
//! Keeps one connection to the update relay, turns inbound frames into typed
//! [`events::Update`]s, suppresses the session's own writes and fans updates out to
//! handlers registered per category. Local changes are announced back through the same
//! connection, or through a one-shot request when the connection is receive only.
//!
//! # Architecture
//!
//! - [`reconnect`]: exponential backoff with an attempt cap, no I/O
//! - [`heartbeat`]: outbound ping cadence and inbound staleness
//! - [`connection`]: the connection state machine
//! - [`transport`]: push stream and duplex socket behind one trait
//! - [`dispatcher`]: parsing, origin suppression, bounded history, handler isolation
//! - [`broadcast`]: outbound announcements
//! - [`manager`]: the task that owns all of the above
//! - [`client`]: builder and cloneable handle
//!
//! # Example
//!
//! ```no_run
//! use events::{Category, Page, UpdateKind};
//! use realtime::{SyncClient, SyncConfig};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), realtime::Error> {
//! let client = SyncClient::builder(SyncConfig::new("http://localhost:3000", Page::Events))
//!     .on_update(Category::Event, |update| {
//!         log::info!("event changed: {:?}", update.label());
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let (handle, _task) = client.spawn();
//! handle
//!     .announce(UpdateKind::EntityCreated(Category::Event), json!({ "eventName": "Sports Day" }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod client;
pub mod collaborators;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod heartbeat;
pub mod manager;
pub mod reconnect;
pub mod transport;

#[cfg(test)]
mod testing;

pub use broadcast::{BroadcastClient, BroadcastRoute, HttpBroadcaster, OneShotSender};
pub use client::{SyncClient, SyncClientBuilder, SyncHandle};
pub use collaborators::{
    CredentialProvider, LogPresentation, NoCredential, Presentation, StaticCredential,
};
pub use config::SyncConfig;
pub use connection::{ConnectionState, ConnectionStatus, TransportKind};
pub use dispatcher::{HandlerError, UpdateHandler};
pub use error::{Error, ErrorKind};
pub use manager::ConnectionInfo;
