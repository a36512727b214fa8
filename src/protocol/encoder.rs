//! Request encoder
//!
//! Turns a command and its byte-string arguments into exact wire bytes.
//!
//! ## Request Layouts
//! ```text
//! inline:      NAME arg1 arg2\r\n
//! bulk value:  NAME arg1 <len>\r\n<value>\r\n
//! multi-bulk:  *<n>\r\n$<len>\r\n<NAME>\r\n$<len>\r\n<arg1>\r\n ...
//! ```
//!
//! Every argument is validated before a single byte is appended, so a
//! rejected request never leaves partial output behind.

use bytes::{BufMut, BytesMut};

use crate::config::EncodingMode;
use crate::error::{KvError, Result};
use super::command::{Command, RequestShape};
use super::numeric;

pub const CRLF: &[u8] = b"\r\n";

// =============================================================================
// Validation
// =============================================================================

/// Check that a key token can travel inline without breaking the framing
pub fn validate_key(command: Command, key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(KvError::argument(format!("{}: empty key", command)));
    }
    if let Some(pos) = key.iter().position(|b| matches!(b, b' ' | b'\r' | b'\n')) {
        return Err(KvError::argument(format!(
            "{}: key contains delimiter byte 0x{:02x} at offset {}",
            command, key[pos], pos
        )));
    }
    Ok(())
}

fn validate_number(command: Command, arg: &[u8]) -> Result<()> {
    numeric::decode_i64(arg)
        .map(|_| ())
        .map_err(|e| KvError::argument(format!("{}: {}", command, e)))
}

fn validate_score(command: Command, arg: &[u8]) -> Result<()> {
    numeric::validate_score(arg).map_err(|e| KvError::argument(format!("{}: {}", command, e)))
}

/// Validate argument count and every key/number token for the command's shape
pub fn validate_args(command: Command, args: &[&[u8]]) -> Result<()> {
    let shape = command.request_shape();

    if let Some(expected) = shape.arity() {
        if args.len() != expected {
            return Err(KvError::argument(format!(
                "{}: expected {} argument(s), got {}",
                command,
                expected,
                args.len()
            )));
        }
    }

    match shape {
        RequestShape::NoArg | RequestShape::Value => Ok(()),
        RequestShape::Num => validate_number(command, args[0]),
        RequestShape::Key | RequestShape::KeyValue => validate_key(command, args[0]),
        RequestShape::KeyKey | RequestShape::KeyKeyValue => {
            validate_key(command, args[0])?;
            validate_key(command, args[1])
        }
        RequestShape::KeyNum | RequestShape::KeyNumValue => {
            validate_key(command, args[0])?;
            validate_number(command, args[1])
        }
        RequestShape::KeyNumNum => {
            validate_key(command, args[0])?;
            validate_number(command, args[1])?;
            validate_number(command, args[2])
        }
        RequestShape::KeyScoreValue => {
            validate_key(command, args[0])?;
            validate_score(command, args[1])
        }
        RequestShape::MultiKey => {
            if args.is_empty() {
                return Err(KvError::argument(format!("{}: at least one key required", command)));
            }
            args.iter().try_for_each(|key| validate_key(command, key))
        }
        RequestShape::BulkSet => {
            if args.is_empty() || args.len() % 2 != 0 {
                return Err(KvError::argument(format!(
                    "{}: expected key/value pairs, got {} argument(s)",
                    command,
                    args.len()
                )));
            }
            args.iter()
                .step_by(2)
                .try_for_each(|key| validate_key(command, key))
        }
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a request, appending its wire bytes to `out`
pub fn encode_request(
    command: Command,
    args: &[&[u8]],
    mode: EncodingMode,
    out: &mut BytesMut,
) -> Result<()> {
    validate_args(command, args)?;

    let shape = command.request_shape();
    match (mode, shape) {
        (EncodingMode::MultiBulk, _) | (EncodingMode::Shaped, RequestShape::BulkSet) => {
            write_multi_bulk(command, args, out)
        }
        (EncodingMode::Shaped, _) if shape.has_bulk_value() => {
            let (value, inline) = match args.split_last() {
                Some(split) => split,
                None => return Err(KvError::argument(format!("{}: missing value", command))),
            };
            write_inline_head(command, inline, out);
            out.put_u8(b' ');
            numeric::encode_into(value.len() as i64, out);
            out.put_slice(CRLF);
            out.put_slice(value);
            out.put_slice(CRLF);
        }
        (EncodingMode::Shaped, _) => {
            write_inline_head(command, args, out);
            out.put_slice(CRLF);
        }
    }
    Ok(())
}

/// Encode a request into a fresh buffer
pub fn encode_to_vec(command: Command, args: &[&[u8]], mode: EncodingMode) -> Result<Vec<u8>> {
    let mut out = BytesMut::new();
    encode_request(command, args, mode, &mut out)?;
    Ok(out.to_vec())
}

fn write_inline_head(command: Command, args: &[&[u8]], out: &mut BytesMut) {
    out.put_slice(command.name().as_bytes());
    for arg in args {
        out.put_u8(b' ');
        out.put_slice(arg);
    }
}

fn write_multi_bulk(command: Command, args: &[&[u8]], out: &mut BytesMut) {
    out.put_u8(b'*');
    numeric::encode_into(args.len() as i64 + 1, out);
    out.put_slice(CRLF);

    write_bulk(command.name().as_bytes(), out);
    for arg in args {
        write_bulk(arg, out);
    }
}

fn write_bulk(data: &[u8], out: &mut BytesMut) {
    out.put_u8(b'$');
    numeric::encode_into(data.len() as i64, out);
    out.put_slice(CRLF);
    out.put_slice(data);
    out.put_slice(CRLF);
}
