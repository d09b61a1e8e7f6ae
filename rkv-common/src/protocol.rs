//! # RESP2 Framing
//!
//! Purpose: Encode outgoing commands, parse replies, and convert replies into
//! the typed shapes the command layer needs.
//!
//! ## Design Principles
//! 1. **Top-Down Parsing**: One reply is read per call with no parser state.
//! 2. **Buffer Reuse**: Callers own the line and write buffers.
//! 3. **Binary-Safe**: Bulk payloads are raw bytes until a conversion asks
//!    for UTF-8.
//! 4. **Fail Fast**: Bad framing is `RkvError::Protocol`, never a guess.

use std::io::{BufRead, Read};

use bytes::{BufMut, BytesMut};

use crate::error::{RkvError, RkvResult};

/// RESP reply value.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// +OK or +PONG style replies.
    Simple(Vec<u8>),
    /// -ERR ... replies.
    Error(Vec<u8>),
    /// :123 replies.
    Integer(i64),
    /// $... bulk strings, with None for null.
    Bulk(Option<Vec<u8>>),
    /// *... arrays; a null array is represented as empty.
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Builds a bulk reply from text.
    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        RespValue::Bulk(Some(data.into()))
    }

    /// Builds an error reply from text.
    pub fn error(message: impl Into<Vec<u8>>) -> Self {
        RespValue::Error(message.into())
    }

    /// Builds the canonical `+OK` reply.
    pub fn ok() -> Self {
        RespValue::Simple(b"OK".to_vec())
    }

    /// Expects a status reply.
    pub fn into_ok(self) -> RkvResult<()> {
        match self {
            RespValue::Simple(_) => Ok(()),
            other => Err(other.unexpected()),
        }
    }

    /// Expects an integer reply.
    pub fn into_integer(self) -> RkvResult<i64> {
        match self {
            RespValue::Integer(value) => Ok(value),
            other => Err(other.unexpected()),
        }
    }

    /// Expects an integer or a null reply (ZRANK style).
    pub fn into_optional_integer(self) -> RkvResult<Option<i64>> {
        match self {
            RespValue::Integer(value) => Ok(Some(value)),
            RespValue::Bulk(None) => Ok(None),
            other => Err(other.unexpected()),
        }
    }

    /// Expects a bulk or status reply and returns it as UTF-8 text.
    pub fn into_string(self) -> RkvResult<Option<String>> {
        match self {
            RespValue::Bulk(None) => Ok(None),
            RespValue::Bulk(Some(data)) | RespValue::Simple(data) => utf8(data).map(Some),
            other => Err(other.unexpected()),
        }
    }

    /// Expects a bulk reply carrying a float (ZSCORE style).
    pub fn into_float(self) -> RkvResult<Option<f64>> {
        match self.into_string()? {
            Some(text) => text
                .parse::<f64>()
                .map(Some)
                .map_err(|_| RkvError::UnexpectedResponse),
            None => Ok(None),
        }
    }

    /// Expects an array whose items may be null (MGET/HMGET style).
    pub fn into_optional_strings(self) -> RkvResult<Vec<Option<String>>> {
        match self {
            RespValue::Array(items) => items.into_iter().map(RespValue::into_string).collect(),
            other => Err(other.unexpected()),
        }
    }

    /// Expects an array of non-null strings (LRANGE/ZRANGE style).
    pub fn into_strings(self) -> RkvResult<Vec<String>> {
        match self {
            RespValue::Array(items) => items
                .into_iter()
                .map(|item| item.into_string()?.ok_or(RkvError::UnexpectedResponse))
                .collect(),
            other => Err(other.unexpected()),
        }
    }

    // Error replies become server errors; anything else is a type mismatch.
    fn unexpected(self) -> RkvError {
        match self {
            RespValue::Error(message) => {
                RkvError::Server(String::from_utf8_lossy(&message).into_owned())
            }
            _ => RkvError::UnexpectedResponse,
        }
    }
}

fn utf8(data: Vec<u8>) -> RkvResult<String> {
    String::from_utf8(data).map_err(|_| RkvError::UnexpectedResponse)
}

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command(args: &[&[u8]], out: &mut BytesMut) {
    out.put_u8(b'*');
    put_decimal(out, args.len() as i64);
    out.put_slice(b"\r\n");
    for arg in args {
        out.put_u8(b'$');
        put_decimal(out, arg.len() as i64);
        out.put_slice(b"\r\n");
        out.put_slice(arg);
        out.put_slice(b"\r\n");
    }
}

/// Encodes a reply value onto the wire.
///
/// The client never sends replies; this exists for in-process servers and
/// scripted test peers.
pub fn encode_value(value: &RespValue, out: &mut BytesMut) {
    match value {
        RespValue::Simple(text) => {
            out.put_u8(b'+');
            out.put_slice(text);
            out.put_slice(b"\r\n");
        }
        RespValue::Error(text) => {
            out.put_u8(b'-');
            out.put_slice(text);
            out.put_slice(b"\r\n");
        }
        RespValue::Integer(value) => {
            out.put_u8(b':');
            put_decimal(out, *value);
            out.put_slice(b"\r\n");
        }
        RespValue::Bulk(None) => out.put_slice(b"$-1\r\n"),
        RespValue::Bulk(Some(data)) => {
            out.put_u8(b'$');
            put_decimal(out, data.len() as i64);
            out.put_slice(b"\r\n");
            out.put_slice(data);
            out.put_slice(b"\r\n");
        }
        RespValue::Array(items) => {
            out.put_u8(b'*');
            put_decimal(out, items.len() as i64);
            out.put_slice(b"\r\n");
            for item in items {
                encode_value(item, out);
            }
        }
    }
}

/// Largest bulk string or array length accepted from a peer (512 MiB, the
/// store's own `proto-max-bulk-len` default).
pub const MAX_FRAME_LEN: i64 = 512 * 1024 * 1024;

// Upfront allocation cap; longer frames grow as bytes arrive.
const PREALLOC_LIMIT: usize = 1024;

/// Reads one RESP value from the buffered reader.
pub fn read_response<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> RkvResult<RespValue> {
    read_line(reader, line_buf)?;
    if line_buf.is_empty() {
        return Err(RkvError::Protocol);
    }

    match line_buf[0] {
        b'+' => Ok(RespValue::Simple(line_buf[1..].to_vec())),
        b'-' => Ok(RespValue::Error(line_buf[1..].to_vec())),
        b':' => Ok(RespValue::Integer(parse_i64(&line_buf[1..])?)),
        b'$' => {
            let len = parse_i64(&line_buf[1..])?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_i64(&line_buf[1..])?;
            read_array(reader, len, line_buf)
        }
        _ => Err(RkvError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> RkvResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Bulk(None));
    }
    let len = frame_len(len)?;
    let mut data = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(RkvError::Protocol);
    }

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != *b"\r\n" {
        return Err(RkvError::Protocol);
    }
    Ok(RespValue::Bulk(Some(data)))
}

fn read_array<R: BufRead>(reader: &mut R, len: i64, line_buf: &mut Vec<u8>) -> RkvResult<RespValue> {
    if len <= 0 {
        return Ok(RespValue::Array(Vec::new()));
    }

    let len = frame_len(len)?;
    let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    for _ in 0..len {
        items.push(read_response(reader, line_buf)?);
    }
    Ok(RespValue::Array(items))
}

fn frame_len(len: i64) -> RkvResult<usize> {
    if len > MAX_FRAME_LEN {
        return Err(RkvError::Protocol);
    }
    usize::try_from(len).map_err(|_| RkvError::Protocol)
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> RkvResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(RkvError::Protocol);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(RkvError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> RkvResult<i64> {
    let (negative, digits) = match data.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, data),
    };
    if digits.is_empty() {
        return Err(RkvError::Protocol);
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(RkvError::Protocol);
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as i64);
    }
    Ok(if negative { -value } else { value })
}

fn put_decimal(out: &mut BytesMut, value: i64) {
    // Stack buffer keeps length prefixes allocation-free.
    let mut buf = [0u8; 20];
    let mut len = 0;
    let mut magnitude = value.unsigned_abs();
    if magnitude == 0 {
        out.put_u8(b'0');
        return;
    }
    while magnitude > 0 {
        buf[len] = b'0' + (magnitude % 10) as u8;
        magnitude /= 10;
        len += 1;
    }
    if value < 0 {
        out.put_u8(b'-');
    }
    for idx in (0..len).rev() {
        out.put_u8(buf[idx]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(raw: &[u8]) -> RkvResult<RespValue> {
        let mut reader = Cursor::new(raw.to_vec());
        let mut line = Vec::new();
        read_response(&mut reader, &mut line)
    }

    #[test]
    fn encodes_command() {
        let mut buf = BytesMut::new();
        encode_command(&[b"HGET", b"user:1", b"name"], &mut buf);
        assert_eq!(&buf[..], b"*3\r\n$4\r\nHGET\r\n$6\r\nuser:1\r\n$4\r\nname\r\n");
    }

    #[test]
    fn encodes_negative_integer_reply() {
        let mut buf = BytesMut::new();
        encode_value(&RespValue::Integer(-2), &mut buf);
        assert_eq!(&buf[..], b":-2\r\n");
    }

    #[test]
    fn parses_nested_array_with_nulls() {
        let resp = parse(b"*3\r\n$1\r\na\r\n$-1\r\n:7\r\n").unwrap();
        assert_eq!(
            resp,
            RespValue::Array(vec![
                RespValue::bulk("a"),
                RespValue::Bulk(None),
                RespValue::Integer(7),
            ])
        );
    }

    #[test]
    fn encoded_reply_parses_back() {
        let reply = RespValue::Array(vec![RespValue::ok(), RespValue::bulk("x y")]);
        let mut buf = BytesMut::new();
        encode_value(&reply, &mut buf);
        assert_eq!(parse(&buf).unwrap(), reply);
    }

    #[test]
    fn rejects_oversized_headers() {
        assert!(matches!(parse(b"*9223372036854775807\r\n"), Err(RkvError::Protocol)));
        assert!(matches!(parse(b"$9223372036854775807\r\n"), Err(RkvError::Protocol)));
        let over = format!("${}\r\n", MAX_FRAME_LEN + 1);
        assert!(matches!(parse(over.as_bytes()), Err(RkvError::Protocol)));
    }

    #[test]
    fn truncated_bulk_is_rejected() {
        assert!(matches!(parse(b"$10\r\nabc"), Err(RkvError::Protocol)));
    }

    #[test]
    fn rejects_missing_crlf() {
        assert!(matches!(parse(b"+OK\n"), Err(RkvError::Protocol)));
        assert!(matches!(parse(b"$3\r\nabcXY"), Err(RkvError::Protocol)));
        assert!(matches!(parse(b":12a\r\n"), Err(RkvError::Protocol)));
    }

    #[test]
    fn error_reply_converts_to_server_error() {
        let err = RespValue::error("WRONGTYPE bad").into_integer().unwrap_err();
        assert!(matches!(err, RkvError::Server(message) if message == "WRONGTYPE bad"));
    }

    #[test]
    fn converts_float_and_optional_integer() {
        assert_eq!(RespValue::bulk("2.5").into_float().unwrap(), Some(2.5));
        assert_eq!(RespValue::bulk("-inf").into_float().unwrap(), Some(f64::NEG_INFINITY));
        assert_eq!(RespValue::Bulk(None).into_optional_integer().unwrap(), None);
        assert!(matches!(
            RespValue::ok().into_integer(),
            Err(RkvError::UnexpectedResponse)
        ));
    }
}
