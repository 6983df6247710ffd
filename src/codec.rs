use bytes::{Buf, BytesMut};
use std::io::{self, Cursor};
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};

pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum CodecError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] frame::Error),
    #[error("Protocol error: frame of {size} bytes exceeds the {max} bytes limit")]
    FrameTooLarge { size: usize, max: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Turns a byte stream into [`Frame`]s and back. Partial frames stay in the read buffer until
/// enough bytes arrive to parse them completely.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            // Not enough data to parse a frame.
            Err(frame::Error::UnexpectedEnd) => {
                // Check if the frame size exceeds a certain limit to prevent DoS attacks.
                if src.len() > self.max_frame_size {
                    return Err(CodecError::FrameTooLarge {
                        size: src.len(),
                        max: self.max_frame_size,
                    });
                }
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let position = cursor.position() as usize;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame.write_to(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"*2\r\n$4\r\nECHO\r\n$2\r\nh"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        // Nothing is consumed until the whole frame is there.
        assert_eq!(buf.len(), 19);

        buf.extend_from_slice(b"i\r\n");
        let frame = codec.decode(&mut buf).unwrap();

        assert_eq!(
            frame,
            Some(Frame::Array(vec![
                Frame::Bulk(Bytes::from("ECHO")),
                Frame::Bulk(Bytes::from("hi")),
            ]))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_pipelined_frames() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n*1"[..]);

        let ping = Some(Frame::Array(vec![Frame::Bulk(Bytes::from("PING"))]));
        assert_eq!(codec.decode(&mut buf).unwrap(), ping);
        assert_eq!(codec.decode(&mut buf).unwrap(), ping);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"*1");
    }

    #[test]
    fn decode_protocol_error() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"$xx\r\nhh\r\n"[..]);

        let err = codec.decode(&mut buf).unwrap_err();

        assert!(matches!(
            err,
            CodecError::Protocol(frame::Error::InvalidLength(ref s)) if s == "xx"
        ));
    }

    #[test]
    fn decode_rejects_oversized_frames() {
        let mut codec = FrameCodec::new(16);
        let mut buf = BytesMut::from(&b"$100\r\n0123456789abcdef"[..]);

        let err = codec.decode(&mut buf).unwrap_err();

        assert!(matches!(
            err,
            CodecError::FrameTooLarge { size: 22, max: 16 }
        ));
    }

    #[test]
    fn encode_frame() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();

        codec
            .encode(Frame::Simple("PONG".to_string()), &mut buf)
            .unwrap();
        codec.encode(Frame::NullBulkString, &mut buf).unwrap();

        assert_eq!(&buf[..], b"+PONG\r\n$-1\r\n");
    }
}
