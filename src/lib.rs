//! # kvwire
//!
//! Client connections for a line-oriented, length-prefixed key-value wire
//! protocol:
//! - Static command catalog with per-command request/response shapes
//! - Byte-exact request encoding and reply decoding over fragmenting streams
//! - Blocking connections (one request, wait for its reply)
//! - Pipelined connections (many requests in flight, FIFO-correlated replies)
//! - Chunked pipelines (requests batched behind an explicit flush)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Code                         │
//! └─────────────┬─────────────────────────────────┬─────────────┘
//!               │ service_request                 │ queue_request / flush
//! ┌─────────────▼─────────────┐     ┌─────────────▼─────────────┐
//! │      SyncConnection       │     │    PipelineConnection     │
//! │  (encode → write → read)  │     │  writer lock + FIFO queue │
//! └─────────────┬─────────────┘     └──────┬─────────────▲──────┘
//!               │                          │             │ resolve
//!        ┌──────▼──────┐            ┌──────▼──────┐ ┌────┴────────┐
//!        │   Encoder   │◄─ Catalog ─│   Encoder   │ │ Reader loop │
//!        └──────┬──────┘            └──────┬──────┘ └────▲────────┘
//!               │                          │             │
//!               ▼                          ▼             │
//!             socket ──► ByteChannel ──► Decoder ────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Fault, FaultKind, KvError, Result};
pub use config::{Config, ConnectionSpec, EncodingMode, PipelineMode};
pub use network::{ConnectionState, PendingResponse, PipelineConnection, SyncConnection};
pub use protocol::{Command, Reply, Response, ResponseStatus};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvwire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
