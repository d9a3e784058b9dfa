//! Newline framing for protocol messages.
//!
//! Each message is written as one line of JSON followed by `\n`. The reader
//! accumulates bytes and yields one message per newline, keeping any partial
//! tail for the next read.

use bytes::{Buf, BufMut, BytesMut};
use log::warn;
use thiserror::Error;

use super::{decode, encode, Message, ProtocolError};
use crate::config::MAX_FRAME_LEN;

const DELIMITER: u8 = b'\n';

/// Fatal framing errors. Malformed content inside a frame is not an error at
/// this level; it is logged and skipped.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame exceeds {max} bytes without a newline")]
    FrameTooLong { max: usize },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Encoder/decoder for newline-delimited JSON frames.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_len: usize,
    // Bytes at the front of the buffer already scanned for a delimiter.
    scanned: usize,
    dropped: u64,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            scanned: 0,
            dropped: 0,
        }
    }

    /// Number of frames dropped because they failed to decode.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Append `msg` and its delimiter to `dst`.
    pub fn encode(&self, msg: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let line = encode(msg)?;
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(DELIMITER);
        Ok(())
    }

    /// Pull the next complete message out of `src`.
    ///
    /// Returns `Ok(None)` when more data is needed. Blank lines and frames
    /// that fail to decode are consumed and skipped.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        loop {
            let start = self.scanned.min(src.len());
            let Some(offset) = src[start..].iter().position(|b| *b == DELIMITER) else {
                self.scanned = src.len();
                if src.len() > self.max_len {
                    return Err(CodecError::FrameTooLong { max: self.max_len });
                }
                return Ok(None);
            };
            let end = start + offset;
            self.scanned = 0;
            let frame = src.split_to(end);
            src.advance(1);

            let mut line = &frame[..];
            if let [rest @ .., b'\r'] = line {
                line = rest;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match decode_frame(line) {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => {
                    self.dropped += 1;
                    warn!("dropping malformed frame ({} bytes): {}", line.len(), e);
                }
            }
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_frame(line: &[u8]) -> Result<Message, ProtocolError> {
    let text = std::str::from_utf8(line)?;
    decode(text)
}
