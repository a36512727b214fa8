//! TCP Transport
//!
//! Opens the socket a connection runs over and lists the session setup
//! requests (AUTH, SELECT) issued through the normal request path.

use std::net::TcpStream;
use std::time::Duration;

use crate::config::ConnectionSpec;
use crate::error::{KvError, Result};
use crate::protocol::{numeric, Command, Response};

/// Read and write handles onto one TCP stream
pub struct TcpHalves {
    pub reader: TcpStream,
    pub writer: TcpStream,
    pub peer_addr: String,
}

/// Connect to `spec.address` and configure timeouts
pub fn connect(spec: &ConnectionSpec) -> Result<TcpHalves> {
    let config = &spec.config;
    config.validate()?;

    let stream = TcpStream::connect(&spec.address)?;

    // Get peer address for logging before we split the stream
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| spec.address.clone());

    stream.set_nodelay(config.tcp_nodelay)?;
    if config.read_timeout_ms > 0 {
        stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
    }
    if config.write_timeout_ms > 0 {
        stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
    }

    // Clone stream for separate read/write handles
    let reader = stream.try_clone()?;

    tracing::debug!("TCP connection established to {}", peer_addr);

    Ok(TcpHalves {
        reader,
        writer: stream,
        peer_addr,
    })
}

/// Requests to run right after connecting, in order
pub fn session_commands(spec: &ConnectionSpec) -> Vec<(Command, Vec<Vec<u8>>)> {
    let mut commands = Vec::new();
    if let Some(password) = &spec.password {
        commands.push((Command::Auth, vec![password.clone()]));
    }
    if spec.database != 0 {
        commands.push((Command::Select, vec![numeric::encode(spec.database as i64)]));
    }
    commands
}

/// Turn a server error reply to a setup request into a hard error
pub fn check_session_reply(response: &Response) -> Result<()> {
    let status = response.status()?;
    if status.is_error() {
        return Err(KvError::Rejected {
            command: response.command().to_string(),
            message: status.message.clone().unwrap_or_default(),
        });
    }
    Ok(())
}
