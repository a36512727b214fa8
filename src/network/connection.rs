//! Synchronous Connection
//!
//! One request at a time: encode, write, decode, return.

use std::io::{Read, Write};
use std::net::TcpStream;

use bytes::BytesMut;

use crate::config::{Config, ConnectionSpec, EncodingMode};
use crate::error::{Fault, KvError, Result};
use crate::protocol::{encode_request, ByteChannel, Command, Response};
use super::transport;

/// Ready/faulted state shared by every connection flavor.
///
/// `Faulted` is terminal: nothing moves a connection back to `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Ready,
    Faulted(Fault),
}

impl ConnectionState {
    /// Fail with the recorded fault unless ready
    pub fn check(&self) -> Result<()> {
        match self {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Faulted(fault) => Err(KvError::Faulted(fault.clone())),
        }
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, ConnectionState::Faulted(_))
    }

    /// The recorded fault, if any
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            ConnectionState::Ready => None,
            ConnectionState::Faulted(fault) => Some(fault),
        }
    }
}

/// Blocking request/reply connection.
///
/// Methods take `&mut self`, so sharing one instance between threads
/// requires wrapping it in a lock; the write-then-read sequence of one call
/// can never interleave with another's.
pub struct SyncConnection<R, W> {
    /// Reply side (buffered for exact-length reads)
    channel: ByteChannel<R>,

    /// Request side
    writer: W,

    /// Encode buffer, reused across calls
    scratch: BytesMut,

    /// Request layout
    encoding: EncodingMode,

    /// Ready until the first stream error
    state: ConnectionState,

    /// Peer address for logging
    peer_addr: String,
}

impl<R: Read, W: Write> SyncConnection<R, W> {
    /// Create a connection over an already-established stream
    pub fn new(reader: R, writer: W, config: &Config) -> Self {
        Self {
            channel: ByteChannel::new(reader, config),
            writer,
            scratch: BytesMut::with_capacity(256),
            encoding: config.encoding,
            state: ConnectionState::Ready,
            peer_addr: "unknown".to_string(),
        }
    }

    /// Set the peer address used in log lines
    pub fn with_peer_addr(mut self, peer_addr: impl Into<String>) -> Self {
        self.peer_addr = peer_addr.into();
        self
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_faulted(&self) -> bool {
        self.state.is_faulted()
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Send one request and block until its reply is decoded.
    ///
    /// Argument errors are returned without touching the stream. Stream
    /// errors fault the connection and are returned as-is; every later call
    /// fails with [`KvError::Faulted`].
    pub fn service_request(&mut self, command: Command, args: &[&[u8]]) -> Result<Response> {
        let mut response = Response::new(command);
        self.service_into(&mut response, args)?;
        Ok(response)
    }

    /// Like [`service_request`](Self::service_request), decoding into a
    /// caller-owned response.
    ///
    /// The response must be unread; call [`Response::reset`] to reuse one.
    pub fn service_into(&mut self, response: &mut Response, args: &[&[u8]]) -> Result<()> {
        self.state.check()?;
        if response.is_read() {
            return Err(KvError::ResponseState(format!(
                "{} response already holds a reply; reset it first",
                response.command()
            )));
        }

        let command = response.command();
        self.scratch.clear();
        encode_request(command, args, self.encoding, &mut self.scratch)?;

        tracing::trace!("Sending {} to {} ({} bytes)", command, self.peer_addr, self.scratch.len());

        if let Err(e) = self
            .writer
            .write_all(&self.scratch)
            .and_then(|_| self.writer.flush())
        {
            return Err(self.fault(KvError::Io(e)));
        }

        if let Err(e) = response.read(&mut self.channel) {
            return Err(self.fault(e));
        }

        if response.status().map(|s| s.is_terminal()).unwrap_or(false) {
            tracing::debug!("Connection to {} closed by {}", self.peer_addr, command);
            self.state = ConnectionState::Faulted(Fault::closed(command.name()));
        }

        Ok(())
    }

    /// Record a stream error as the connection's permanent fault
    fn fault(&mut self, err: KvError) -> KvError {
        if err.is_fatal() && !self.state.is_faulted() {
            let fault = Fault::from(&err);
            tracing::warn!("Connection to {} faulted: {}", self.peer_addr, fault);
            self.state = ConnectionState::Faulted(fault);
        }
        err
    }
}

impl SyncConnection<TcpStream, TcpStream> {
    /// Connect over TCP and run AUTH / SELECT when configured
    pub fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let halves = transport::connect(spec)?;
        let mut conn = SyncConnection::new(halves.reader, halves.writer, &spec.config)
            .with_peer_addr(halves.peer_addr);

        for (command, args) in transport::session_commands(spec) {
            let args: Vec<&[u8]> = args.iter().map(|a| a.as_slice()).collect();
            let response = conn.service_request(command, &args)?;
            transport::check_session_reply(&response)?;
        }

        tracing::debug!("Connected to {}", conn.peer_addr);
        Ok(conn)
    }
}
