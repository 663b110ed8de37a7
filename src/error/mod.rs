//! Error types for the agent.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
