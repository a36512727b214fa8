//! Configuration for kvwire
//!
//! Centralized configuration with sensible defaults.

use crate::error::{KvError, Result};

/// How requests are laid out on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    /// Layout chosen by each command's request shape (inline, bulk, or
    /// count-prefixed)
    Shaped,

    /// Every request uses the count-prefixed multi-bulk layout
    MultiBulk,
}

/// When a pipelined connection puts queued requests on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Write each request as soon as it is queued
    Immediate,

    /// Accumulate requests locally until `flush()` is called
    Chunked,
}

/// Main configuration for a connection
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Request layout
    pub encoding: EncodingMode,

    /// Size of each read from the underlying stream (in bytes)
    pub read_chunk_size: usize,

    /// Longest reply line accepted before the stream is considered corrupt
    pub max_line_length: usize,

    // -------------------------------------------------------------------------
    // Pipeline Configuration
    // -------------------------------------------------------------------------
    /// Write discipline for pipelined connections
    pub pipeline_mode: PipelineMode,

    /// Chunked mode only: flush automatically once this many bytes are
    /// buffered
    pub chunk_flush_threshold: Option<usize>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Socket read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm
    pub tcp_nodelay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encoding: EncodingMode::Shaped,
            read_chunk_size: 8 * 1024,
            max_line_length: 64 * 1024,
            pipeline_mode: PipelineMode::Immediate,
            chunk_flush_threshold: None,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            tcp_nodelay: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings that would make the channel unusable
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(KvError::Config("read_chunk_size must be > 0".to_string()));
        }
        if self.max_line_length < 3 {
            return Err(KvError::Config(format!(
                "max_line_length must be at least 3, got {}",
                self.max_line_length
            )));
        }
        if self.chunk_flush_threshold == Some(0) {
            return Err(KvError::Config(
                "chunk_flush_threshold must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the request layout
    pub fn encoding(mut self, mode: EncodingMode) -> Self {
        self.config.encoding = mode;
        self
    }

    /// Set the size of each underlying read (in bytes)
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Set the longest accepted reply line (in bytes)
    pub fn max_line_length(mut self, size: usize) -> Self {
        self.config.max_line_length = size;
        self
    }

    /// Set the pipelined write discipline
    pub fn pipeline_mode(mut self, mode: PipelineMode) -> Self {
        self.config.pipeline_mode = mode;
        self
    }

    /// Flush a chunked pipeline automatically past this many buffered bytes
    pub fn chunk_flush_threshold(mut self, bytes: usize) -> Self {
        self.config.chunk_flush_threshold = Some(bytes);
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.config.tcp_nodelay = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Where and as whom to connect.
///
/// Only consumed when establishing a connection; the protocol core never
/// looks at it.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    /// Server address (host:port)
    pub address: String,

    /// Database index selected after connecting
    pub database: u32,

    /// Password sent with AUTH after connecting
    pub password: Option<Vec<u8>>,

    /// Connection configuration
    pub config: Config,
}

impl Default for ConnectionSpec {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            database: 0,
            password: None,
            config: Config::default(),
        }
    }
}

impl ConnectionSpec {
    /// Create a spec for the given address with default settings
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Select a database index after connecting
    pub fn database(mut self, index: u32) -> Self {
        self.database = index;
        self
    }

    /// Authenticate after connecting
    pub fn password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Replace the connection configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }
}
