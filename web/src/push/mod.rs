//! Push stream endpoint. The relay core (Manager, ConnectionRegistry, frames) lives in
//! the `sse` crate.

pub mod handler;
