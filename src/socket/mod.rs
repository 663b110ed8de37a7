//! Unix socket host.
//!
//! Serves the dispatcher over a Unix socket using the length-prefixed JSON
//! framing from [`crate::protocol`].

mod connection;
mod listener;

pub use connection::{execute, handle_connection};
pub use listener::{ConnectionMetrics, SocketListener};
