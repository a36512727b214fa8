//! Protocol Module
//!
//! Command catalog plus the byte-level request encoding and reply
//! decoding for the line-oriented wire protocol.
//!
//! ## Request Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ NAME arg1 arg2\r\n                 (inline)  │
//! │ NAME key <len>\r\n<value>\r\n      (bulk)    │
//! │ *<n>\r\n($<len>\r\n<arg>\r\n)*     (counted) │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ### Reply Format
//! ```text
//! ┌────────────┬──────────────────────────────────┐
//! │ Marker (1) │ Line ... \r\n   [payload\r\n]    │
//! └────────────┴──────────────────────────────────┘
//! ```
//!
//! ### Reply Markers
//! - `+`: status
//! - `-`: error
//! - `:`: integer
//! - `$`: bulk length (`-1` = nil)
//! - `*`: multi-bulk count (`-1` = nil list)

mod command;
mod channel;
mod decoder;
mod encoder;
mod response;

pub mod numeric;

pub use channel::ByteChannel;
pub use command::{Command, CommandSpec, RequestShape, ResponseShape, ValueKind};
pub use decoder::{decode, MAX_BULK_LEN};
pub use encoder::{encode_request, encode_to_vec, validate_args, validate_key};
pub use response::{Reply, Response, ResponseStatus, StatusCode};
