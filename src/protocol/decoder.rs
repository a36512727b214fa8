//! Response decoder
//!
//! Reads exactly one reply for a command, using the command's response
//! shape to pick the decode routine.
//!
//! ## Reply Markers
//! - `+` status line
//! - `-` error line
//! - `:` integer line
//! - `$` bulk length line, followed by payload + CRLF (`$-1` is nil)
//! - `*` multi-bulk count line, followed by that many replies (`*-1` is nil)

use std::io::Read;

use bytes::Bytes;

use crate::error::{KvError, Result};
use super::channel::ByteChannel;
use super::command::{Command, ResponseShape, ValueKind};
use super::numeric;
use super::response::{Reply, ResponseStatus};

/// Largest bulk payload accepted (512 MB)
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Deepest aggregate nesting accepted
const MAX_NESTING: usize = 32;

/// Decode one reply for `command`
pub fn decode<R: Read>(
    command: Command,
    channel: &mut ByteChannel<R>,
) -> Result<(ResponseStatus, Reply)> {
    let (marker, body) = match read_header(channel) {
        Ok(header) => header,
        // The server may close right after (or instead of) acknowledging
        Err(KvError::EndOfStream { available: 0, .. }) if command.is_terminal() => {
            return Ok((ResponseStatus::TERMINAL, Reply::None));
        }
        Err(e) => return Err(e),
    };

    if marker == b'-' {
        return Ok((ResponseStatus::error(text(&body)?), Reply::None));
    }

    match command.response_shape() {
        ResponseShape::Status => decode_status(command, marker, &body),
        ResponseShape::Value(kind) => decode_value(command, kind, marker, &body),
        ResponseShape::Bulk => match marker {
            b'$' => Ok((ResponseStatus::OK, Reply::Bulk(read_bulk_body(channel, &body)?))),
            _ => queued_or_unexpected(command, marker, &body),
        },
        ResponseShape::MultiBulk => match marker {
            b'*' => Ok((ResponseStatus::OK, Reply::MultiBulk(read_multi_bulk(channel, &body)?))),
            _ => queued_or_unexpected(command, marker, &body),
        },
        ResponseShape::Aggregate => match marker {
            b'*' => Ok((ResponseStatus::OK, Reply::Aggregate(read_aggregate(channel, &body, 0)?))),
            _ => queued_or_unexpected(command, marker, &body),
        },
    }
}

// =============================================================================
// Per-shape routines
// =============================================================================

fn decode_status(command: Command, marker: u8, body: &[u8]) -> Result<(ResponseStatus, Reply)> {
    match marker {
        b'+' if command.is_terminal() => Ok((ResponseStatus::TERMINAL, Reply::None)),
        b'+' if body == b"QUEUED" => Ok((ResponseStatus::OK, Reply::Queued)),
        b'+' => Ok((ResponseStatus::OK, Reply::None)),
        _ => Err(unexpected(command, marker)),
    }
}

fn decode_value(
    command: Command,
    kind: ValueKind,
    marker: u8,
    body: &[u8],
) -> Result<(ResponseStatus, Reply)> {
    if marker == b'+' && body == b"QUEUED" {
        return Ok((ResponseStatus::OK, Reply::Queued));
    }

    let reply = match (kind, marker) {
        (ValueKind::Number, b':') => Reply::Number(parse_number(body)?),
        (ValueKind::Boolean, b':') => match body {
            b"0" => Reply::Boolean(false),
            b"1" => Reply::Boolean(true),
            other => {
                return Err(KvError::protocol(format!(
                    "{}: boolean reply must be 0 or 1, got {:?}",
                    command,
                    String::from_utf8_lossy(other)
                )))
            }
        },
        (ValueKind::String, b'+') => Reply::Text(text(body)?),
        _ => return Err(unexpected(command, marker)),
    };
    Ok((ResponseStatus::OK, reply))
}

fn queued_or_unexpected(command: Command, marker: u8, body: &[u8]) -> Result<(ResponseStatus, Reply)> {
    if marker == b'+' && body == b"QUEUED" {
        Ok((ResponseStatus::OK, Reply::Queued))
    } else {
        Err(unexpected(command, marker))
    }
}

// =============================================================================
// Building blocks
// =============================================================================

/// Read a reply line and split off its one-byte marker
fn read_header<R: Read>(channel: &mut ByteChannel<R>) -> Result<(u8, Bytes)> {
    let line = channel.read_line()?;
    match line.first() {
        Some(&marker) => Ok((marker, line.slice(1..))),
        None => Err(KvError::protocol("empty reply line")),
    }
}

fn unexpected(command: Command, marker: u8) -> KvError {
    KvError::protocol(format!(
        "{}: unexpected reply marker {:?} for {:?} response",
        command,
        marker as char,
        command.response_shape()
    ))
}

fn text(body: &[u8]) -> Result<String> {
    String::from_utf8(body.to_vec())
        .map_err(|_| KvError::protocol("reply line is not valid UTF-8"))
}

fn parse_number(body: &[u8]) -> Result<i64> {
    numeric::decode_i64(body).map_err(|e| KvError::protocol(format!("bad integer reply: {}", e)))
}

/// Parse a declared length or count; -1 means nil
fn parse_length(body: &[u8], limit: usize) -> Result<Option<usize>> {
    match parse_number(body)? {
        -1 => Ok(None),
        n if n < -1 => Err(KvError::protocol(format!("negative length {}", n))),
        n if n as u64 > limit as u64 => Err(KvError::protocol(format!(
            "declared length {} exceeds limit {}",
            n, limit
        ))),
        n => Ok(Some(n as usize)),
    }
}

/// Payload following a `$len` header
fn read_bulk_body<R: Read>(channel: &mut ByteChannel<R>, header: &[u8]) -> Result<Option<Bytes>> {
    let len = match parse_length(header, MAX_BULK_LEN)? {
        Some(len) => len,
        None => return Ok(None),
    };

    let data = channel.read_exact(len + 2)?;
    if &data[len..] != b"\r\n" {
        return Err(KvError::protocol(format!(
            "bulk payload of {} bytes not followed by CRLF",
            len
        )));
    }
    Ok(Some(data.slice(..len)))
}

/// Elements following a `*count` header, each a bulk value
fn read_multi_bulk<R: Read>(
    channel: &mut ByteChannel<R>,
    header: &[u8],
) -> Result<Option<Vec<Option<Bytes>>>> {
    let count = match parse_length(header, i32::MAX as usize)? {
        Some(count) => count,
        None => return Ok(None),
    };

    let mut values = Vec::with_capacity(count.min(1024));
    for index in 0..count {
        let (marker, body) = read_header(channel)?;
        if marker != b'$' {
            return Err(KvError::protocol(format!(
                "multi-bulk element {} of {} has marker {:?}, expected '$'",
                index, count, marker as char
            )));
        }
        values.push(read_bulk_body(channel, &body)?);
    }
    Ok(Some(values))
}

/// Elements following a `*count` header, each decoded by its own marker
fn read_aggregate<R: Read>(
    channel: &mut ByteChannel<R>,
    header: &[u8],
    depth: usize,
) -> Result<Option<Vec<Reply>>> {
    if depth >= MAX_NESTING {
        return Err(KvError::protocol("aggregate reply nested too deeply"));
    }
    let count = match parse_length(header, i32::MAX as usize)? {
        Some(count) => count,
        None => return Ok(None),
    };

    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let (marker, body) = read_header(channel)?;
        let item = match marker {
            b'+' => Reply::Text(text(&body)?),
            b'-' => Reply::Error(text(&body)?),
            b':' => Reply::Number(parse_number(&body)?),
            b'$' => Reply::Bulk(read_bulk_body(channel, &body)?),
            b'*' => Reply::Aggregate(read_aggregate(channel, &body, depth + 1)?),
            other => {
                return Err(KvError::protocol(format!(
                    "unknown reply marker {:?} inside aggregate",
                    other as char
                )))
            }
        };
        items.push(item);
    }
    Ok(Some(items))
}
