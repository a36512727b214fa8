//! Network Module
//!
//! Connections that carry requests and replies over a byte stream.
//!
//! ## Architecture
//! - `SyncConnection`: one request at a time, caller blocks for the reply
//! - `PipelineConnection`: many requests in flight, one background reader
//!   resolving handles in write order (immediate or chunked writes)
//! - `transport`: TCP establishment and session setup

mod connection;
mod pipeline;

pub mod transport;

pub use connection::{ConnectionState, SyncConnection};
pub use pipeline::{PipelineConnection, PendingResponse};
