// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use std::str;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Deepest array nesting accepted from a peer.
pub const MAX_NESTING_DEPTH: usize = 64;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("unknown frame data type: {0:#04x}")]
    UnknownType(u8),
    #[error("malformed line; expected CRLF terminator")]
    MalformedLine,
    #[error("not enough data is available to parse an entire frame")]
    UnexpectedEnd,
    #[error("invalid integer {0:?}")]
    InvalidInteger(String),
    #[error("invalid length {0:?}")]
    InvalidLength(String),
    #[error("arrays nested deeper than {0} levels")]
    NestingTooDeep(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    NullBulkString,
    Array(Vec<Frame>),
    NullArray,
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    /// Builds an error reply. Line breaks are replaced so the message always fits in a single
    /// RESP line, whatever the client sent us.
    pub fn error(msg: impl AsRef<str>) -> Frame {
        let msg = msg.as_ref().replace(['\r', '\n'], " ");
        Frame::Error(msg)
    }

    /// Parses exactly one frame from `src`, leaving the cursor right after it.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        Self::parse_nested(src, 0)
    }

    fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let line = get_line(src)?;
                Ok(Frame::Simple(utf8(line)?.to_string()))
            }
            DataType::SimpleError => {
                let line = get_line(src)?;
                Ok(Frame::Error(utf8(line)?.to_string()))
            }
            DataType::Integer => {
                let line = get_line(src)?;
                let integer =
                    parse_decimal(line).ok_or_else(|| Error::InvalidInteger(lossy(line)))?;

                Ok(Frame::Integer(integer))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let Some(length) = get_length(src)? else {
                    return Ok(Frame::NullBulkString);
                };

                if src.remaining() < length {
                    return Err(Error::UnexpectedEnd);
                }

                let start = src.position() as usize;
                let data = Bytes::copy_from_slice(&src.get_ref()[start..start + length]);
                src.advance(length);

                // The payload is always followed by a CRLF that is not part of it.
                let rest = src.chunk();
                match [rest.first().copied(), rest.get(1).copied()] {
                    [Some(b'\r'), Some(b'\n')] => src.advance(CRLF.len()),
                    [None, _] | [Some(b'\r'), None] => return Err(Error::UnexpectedEnd),
                    _ => return Err(Error::MalformedLine),
                }

                Ok(Frame::Bulk(data))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                let Some(length) = get_length(src)? else {
                    return Ok(Frame::NullArray);
                };

                if depth >= MAX_NESTING_DEPTH {
                    return Err(Error::NestingTooDeep(MAX_NESTING_DEPTH));
                }

                // Preallocation is capped by the buffered input, not the announced length.
                let mut frames = Vec::with_capacity(length.min(src.remaining()));
                for _ in 0..length {
                    let frame = Self::parse_nested(src, depth + 1)?;
                    frames.push(frame);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    pub fn write_to(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(u8::from(DataType::SimpleString));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.put_u8(u8::from(DataType::SimpleError));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Integer(i) => {
                dst.put_u8(u8::from(DataType::Integer));
                dst.put_slice(i.to_string().as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.reserve(1 + 20 + CRLF.len() + bytes.len() + CRLF.len());
                dst.put_u8(u8::from(DataType::BulkString));
                dst.put_slice(bytes.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                dst.put_slice(bytes);
                dst.put_slice(CRLF);
            }
            Frame::NullBulkString => dst.put_slice(b"$-1\r\n"),
            Frame::Array(arr) => {
                dst.put_u8(u8::from(DataType::Array));
                dst.put_slice(arr.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                for frame in arr {
                    frame.write_to(dst);
                }
            }
            Frame::NullArray => dst.put_slice(b"*-1\r\n"),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        self.write_to(&mut bytes);
        bytes.to_vec()
    }

    /// Name of the frame's RESP type, used in replies that must not echo the payload.
    pub fn type_name(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "bulk string",
            Frame::NullBulkString => "null bulk string",
            Frame::Array(_) => "array",
            Frame::NullArray => "null array",
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::NullBulkString => write!(f, "$-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
            Frame::NullArray => write!(f, "*-1"),
        }
    }
}

/// Reads up to the next CRLF and returns the line without its terminator.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let mut i = start;
    while i < buf.len() {
        if buf[i] == b'\r' {
            return match buf.get(i + 1) {
                Some(b'\n') => {
                    src.set_position((i + CRLF.len()) as u64);
                    Ok(&buf[start..i])
                }
                Some(_) => Err(Error::MalformedLine),
                None => Err(Error::UnexpectedEnd),
            };
        }
        i += 1;
    }

    Err(Error::UnexpectedEnd)
}

/// Reads a length line. Negative lengths are the RESP2 null markers and yield `None`.
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, Error> {
    let line = get_line(src)?;
    let length = parse_decimal(line).ok_or_else(|| Error::InvalidLength(lossy(line)))?;

    if length < 0 {
        return Ok(None);
    }

    usize::try_from(length)
        .map(Some)
        .map_err(|_| Error::InvalidLength(lossy(line)))
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::UnexpectedEnd);
    }
    Ok(src.get_u8())
}

fn parse_decimal(line: &[u8]) -> Option<i64> {
    str::from_utf8(line).ok()?.parse::<i64>().ok()
}

fn utf8(line: &[u8]) -> Result<&str, Error> {
    str::from_utf8(line).map_err(|_| Error::MalformedLine)
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::UnknownType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}
