//! Response definitions
//!
//! A [`Response`] is bound to the command that produced it and is filled
//! exactly once by the decoder.

use std::io::Read;

use bytes::Bytes;

use crate::error::{KvError, Result};
use super::channel::ByteChannel;
use super::command::Command;
use super::decoder;

/// Outcome category of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Command accepted
    Success,

    /// Server replied with an error line
    Error,

    /// Command accepted and the server is closing the connection
    Terminal,
}

/// Status of a decoded reply plus the server's message, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStatus {
    pub code: StatusCode,
    pub message: Option<String>,
}

impl ResponseStatus {
    /// Shared status for every plain success; carries no allocation
    pub const OK: ResponseStatus = ResponseStatus {
        code: StatusCode::Success,
        message: None,
    };

    /// Status for a successful QUIT / SHUTDOWN
    pub const TERMINAL: ResponseStatus = ResponseStatus {
        code: StatusCode::Terminal,
        message: None,
    };

    /// Server-side error with its message text
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code == StatusCode::Error
    }

    pub fn is_terminal(&self) -> bool {
        self.code == StatusCode::Terminal
    }
}

/// Decoded reply payload
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Status-only reply (or a server error at the top level)
    None,

    /// Command accepted into a MULTI block
    Queued,

    Number(i64),

    Boolean(bool),

    /// Single-line string value (e.g. TYPE), or a status line inside an
    /// aggregate
    Text(String),

    /// Error line inside an aggregate
    Error(String),

    /// Bulk value; `None` is nil, distinct from an empty value
    Bulk(Option<Bytes>),

    /// List of bulk values; the outer `None` is a nil list
    MultiBulk(Option<Vec<Option<Bytes>>>),

    /// List of heterogeneous replies; the outer `None` is a nil list
    Aggregate(Option<Vec<Reply>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Unread,
    Read,
}

/// Reply to one command.
///
/// Starts unread; [`Response::read`] decodes it once. Reading again fails
/// unless [`Response::reset`] is called first, which lets a hot path reuse
/// a single instance for successive replies of the same command.
#[derive(Debug, Clone)]
pub struct Response {
    command: Command,
    state: ReadState,
    status: ResponseStatus,
    reply: Reply,
}

impl Response {
    /// Create an unread response for `command`
    pub fn new(command: Command) -> Self {
        Self {
            command,
            state: ReadState::Unread,
            status: ResponseStatus::OK,
            reply: Reply::None,
        }
    }

    /// The command this response belongs to
    pub fn command(&self) -> Command {
        self.command
    }

    pub fn is_read(&self) -> bool {
        self.state == ReadState::Read
    }

    /// Decode this command's reply from the channel
    pub fn read<R: Read>(&mut self, channel: &mut ByteChannel<R>) -> Result<()> {
        if self.is_read() {
            return Err(KvError::ResponseState(format!(
                "{} response already read",
                self.command
            )));
        }
        let (status, reply) = decoder::decode(self.command, channel)?;
        self.status = status;
        self.reply = reply;
        self.state = ReadState::Read;
        Ok(())
    }

    /// Return to the unread state so the instance can take another reply
    pub fn reset(&mut self) {
        self.state = ReadState::Unread;
        self.status = ResponseStatus::OK;
        self.reply = Reply::None;
    }

    fn ensure_read(&self) -> Result<()> {
        if self.is_read() {
            Ok(())
        } else {
            Err(KvError::ResponseState(format!(
                "{} response has not been read",
                self.command
            )))
        }
    }

    /// Reply status
    pub fn status(&self) -> Result<&ResponseStatus> {
        self.ensure_read()?;
        Ok(&self.status)
    }

    /// Whether the server replied with an error (false while unread)
    pub fn is_error(&self) -> bool {
        self.is_read() && self.status.is_error()
    }

    /// Decoded payload
    pub fn reply(&self) -> Result<&Reply> {
        self.ensure_read()?;
        Ok(&self.reply)
    }

    /// Take the decoded payload
    pub fn into_reply(self) -> Result<Reply> {
        self.ensure_read()?;
        Ok(self.reply)
    }

    // -------------------------------------------------------------------------
    // Typed accessors
    // -------------------------------------------------------------------------

    fn mismatch(&self, wanted: &str) -> KvError {
        match &self.status.message {
            Some(message) if self.status.is_error() => KvError::ResponseState(format!(
                "{} replied with error: {}",
                self.command, message
            )),
            _ => KvError::ResponseState(format!(
                "{} reply is {:?}, not {}",
                self.command, self.reply, wanted
            )),
        }
    }

    pub fn number(&self) -> Result<i64> {
        match self.reply()? {
            Reply::Number(n) => Ok(*n),
            _ => Err(self.mismatch("a number")),
        }
    }

    pub fn boolean(&self) -> Result<bool> {
        match self.reply()? {
            Reply::Boolean(b) => Ok(*b),
            _ => Err(self.mismatch("a boolean")),
        }
    }

    pub fn text(&self) -> Result<&str> {
        match self.reply()? {
            Reply::Text(s) => Ok(s),
            _ => Err(self.mismatch("a string")),
        }
    }

    pub fn bulk(&self) -> Result<Option<&Bytes>> {
        match self.reply()? {
            Reply::Bulk(value) => Ok(value.as_ref()),
            _ => Err(self.mismatch("a bulk value")),
        }
    }

    pub fn multi_bulk(&self) -> Result<Option<&[Option<Bytes>]>> {
        match self.reply()? {
            Reply::MultiBulk(values) => Ok(values.as_deref()),
            _ => Err(self.mismatch("a multi-bulk list")),
        }
    }

    pub fn aggregate(&self) -> Result<Option<&[Reply]>> {
        match self.reply()? {
            Reply::Aggregate(items) => Ok(items.as_deref()),
            _ => Err(self.mismatch("an aggregate")),
        }
    }
}
