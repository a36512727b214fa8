//! Error types for kvwire
//!
//! Provides a unified error type for all operations, plus the [`Fault`]
//! record a connection keeps once it has failed permanently.

use std::fmt;

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for kvwire operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Caller Errors (never fault a connection)
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Response state error: {0}")]
    ResponseState(String),

    #[error("Timed out waiting for response")]
    Timeout,

    // -------------------------------------------------------------------------
    // Stream Errors (fault the owning connection)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("End of stream: expected {expected} bytes, {available} available")]
    EndOfStream { expected: usize, available: usize },

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Connection faulted: {0}")]
    Faulted(Fault),

    #[error("Server rejected {command}: {message}")]
    Rejected { command: String, message: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Whether this error leaves the byte stream at an unknown position.
    ///
    /// Fatal errors move the owning connection to the faulted state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KvError::Io(_) | KvError::Protocol(_) | KvError::EndOfStream { .. } | KvError::Faulted(_)
        )
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        KvError::Protocol(message.into())
    }

    pub(crate) fn argument(message: impl Into<String>) -> Self {
        KvError::Argument(message.into())
    }
}

/// Category of the failure that faulted a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Transport failure
    Io,

    /// Reply bytes did not match any understood shape
    Protocol,

    /// Peer closed the stream while a reply was outstanding
    EndOfStream,

    /// Connection ended by a terminal command (QUIT, SHUTDOWN)
    Closed,
}

/// Stable description of why a connection stopped serving requests.
///
/// Cloned into every error handed out after the fault, so callers always
/// see the original cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Fault recorded after a terminal command completed.
    pub fn closed(command: &str) -> Self {
        Self::new(FaultKind::Closed, format!("connection closed by {}", command))
    }
}

impl From<&KvError> for Fault {
    fn from(err: &KvError) -> Self {
        match err {
            KvError::Io(e) => Fault::new(FaultKind::Io, e.to_string()),
            KvError::EndOfStream { .. } => Fault::new(FaultKind::EndOfStream, err.to_string()),
            KvError::Faulted(fault) => fault.clone(),
            other => Fault::new(FaultKind::Protocol, other.to_string()),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
