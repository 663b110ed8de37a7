//! Error types for the agent.

use thiserror::Error;

use crate::protocol::{PacketResult, TlvType};

/// Main error type for the agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket-related errors.
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Command dispatch and execution errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Extension loading errors.
    #[error("Extension error: {kind}")]
    Extension { kind: ExtensionErrorKind },

    /// Protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Command error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("Missing required TLV: {tlv:?}")]
    MissingTlv { tlv: TlvType },

    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },
}

/// Extension error kinds.
#[derive(Error, Debug)]
pub enum ExtensionErrorKind {
    #[error("Failed to load module: {message}")]
    ModuleLoad { message: String },

    #[error("Command registry is no longer available")]
    RegistryUnavailable,
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,
}

impl AgentError {
    /// Shorthand for an unknown command error.
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::Command {
            kind: CommandErrorKind::UnknownCommand { name: name.into() },
        }
    }

    /// Shorthand for a missing TLV error.
    pub fn missing_tlv(tlv: TlvType) -> Self {
        Self::Command {
            kind: CommandErrorKind::MissingTlv { tlv },
        }
    }

    /// Result code reported to the peer when this error ends a request.
    pub fn result_code(&self) -> PacketResult {
        match self {
            Self::Command {
                kind: CommandErrorKind::UnknownCommand { .. },
            } => PacketResult::CallNotImplemented,
            Self::Command {
                kind: CommandErrorKind::MissingTlv { .. },
            } => PacketResult::InvalidParameter,
            Self::Extension {
                kind: ExtensionErrorKind::ModuleLoad { .. },
            } => PacketResult::BadFormat,
            Self::Protocol {
                kind: ProtocolErrorKind::InvalidMessageFormat { .. },
            } => PacketResult::InvalidData,
            _ => PacketResult::GeneralFailure,
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
