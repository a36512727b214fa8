//! Buffered byte channel
//!
//! Exact-length and line reads over a byte source whose reads may return
//! arbitrarily short fragments.

use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::config::Config;
use crate::error::{KvError, Result};

/// Buffered reader handing out exact-length slices and CRLF lines
pub struct ByteChannel<R> {
    /// Raw byte source (usually the socket read half)
    source: R,

    /// Bytes received but not yet consumed
    buffer: BytesMut,

    /// Size of each underlying read
    chunk_size: usize,

    /// Longest line accepted, CRLF included
    max_line_length: usize,
}

impl<R: Read> ByteChannel<R> {
    /// Wrap a source using the channel settings from `config`
    pub fn new(source: R, config: &Config) -> Self {
        Self::with_limits(source, config.read_chunk_size, config.max_line_length)
    }

    /// Wrap a source with explicit limits
    pub fn with_limits(source: R, chunk_size: usize, max_line_length: usize) -> Self {
        Self {
            source,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size: chunk_size.max(1),
            max_line_length,
        }
    }

    /// Number of bytes received but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pull one chunk from the source. Returns 0 on end of stream.
    fn fill(&mut self) -> Result<usize> {
        let start = self.buffer.len();
        self.buffer.resize(start + self.chunk_size, 0);
        loop {
            match self.source.read(&mut self.buffer[start..]) {
                Ok(n) => {
                    self.buffer.truncate(start + n);
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(KvError::Io(e));
                }
            }
        }
    }

    /// Block until exactly `len` bytes are available and return them.
    ///
    /// A zero-length read succeeds immediately with an empty slice. Running
    /// out of input first yields [`KvError::EndOfStream`].
    pub fn read_exact(&mut self, len: usize) -> Result<Bytes> {
        while self.buffer.len() < len {
            if self.fill()? == 0 {
                return Err(KvError::EndOfStream {
                    expected: len,
                    available: self.buffer.len(),
                });
            }
        }
        Ok(self.buffer.split_to(len).freeze())
    }

    /// Read up to the next CRLF and return the line without its terminator
    pub fn read_line(&mut self) -> Result<Bytes> {
        let mut scanned = 0;
        loop {
            if let Some(offset) = self.buffer[scanned..].iter().position(|&b| b == b'\n') {
                let lf = scanned + offset;
                if lf + 1 > self.max_line_length {
                    return Err(self.line_too_long());
                }
                if lf == 0 || self.buffer[lf - 1] != b'\r' {
                    return Err(KvError::protocol("line terminated by LF without CR"));
                }
                let mut line = self.buffer.split_to(lf + 1);
                line.truncate(lf - 1);
                return Ok(line.freeze());
            }

            scanned = self.buffer.len();
            if scanned >= self.max_line_length {
                return Err(self.line_too_long());
            }

            if self.fill()? == 0 {
                // Expected at least the CRLF terminator beyond what we have
                return Err(KvError::EndOfStream {
                    expected: scanned + 2,
                    available: scanned,
                });
            }
        }
    }

    fn line_too_long(&self) -> KvError {
        KvError::protocol(format!("reply line exceeds {} bytes", self.max_line_length))
    }
}
