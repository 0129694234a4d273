//! Relay core for prefect-admin live updates.
//!
//! Every open admin page holds one connection, a push stream or a socket. When a page
//! announces a change, the relay forwards it to every other connection and keeps it in
//! a short window so pages that connect a moment later still hear about it.
//!
//! # Architecture
//!
//! - **Dual-index registry**: connections are looked up by connection id for
//!   registration and cleanup, and by session id for origin exclusion and heartbeats.
//! - **Transport neutral**: the registry only holds channel senders of
//!   [`message::OutboundFrame`]; the web layer renders frames as SSE events or socket
//!   messages.
//! - **Ephemeral**: the replay window is small and in memory. Clients treat every update
//!   as a hint to re-fetch, so missed updates are tolerated.
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry with dual-index architecture and type-safe ConnectionId
//! - `manager`: fan-out, replay window, heartbeat sweep, force refresh and stats
//! - `message`: transport-neutral outbound frames

pub mod connection;
pub mod manager;
pub mod message;

pub use manager::Manager;
pub use message::OutboundFrame;
