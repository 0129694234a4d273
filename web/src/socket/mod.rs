//! Duplex socket endpoint for clients that send their updates over the same connection.

pub mod handler;
