//! Extensible agent command core.
//!
//! Maps request methods to registered handlers, loads extensions at runtime
//! and enumerates the commands each extension contributed. The `socket`
//! module hosts the core behind a Unix socket.

pub mod commands;
pub mod config;
pub mod error;
pub mod extensions;
pub mod protocol;
pub mod socket;
