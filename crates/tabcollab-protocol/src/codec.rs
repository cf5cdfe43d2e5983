//! Newline-delimited frame codec for the collaboration TCP stream.
//!
//! Wire format: record text + `\n`. The decoder yields raw frame bytes
//! (terminator stripped) so a malformed record can be dropped without
//! tearing down the stream; `record::decode` turns a frame into a `Record`.
//!
//! An inbound frame longer than `max_frame_bytes` is discarded up to its
//! terminator and reported as `Frame::Oversized`. The stream stays usable.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::record::Record;
use crate::{ProtocolError, MAX_FRAME_BYTES, TERMINATOR};

/// One unit read off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Frame bytes, terminator stripped.
    Line(BytesMut),
    /// A frame over the size limit was skipped. `size` counts the discarded
    /// bytes, terminator excluded.
    Oversized { size: usize },
}

impl Frame {
    /// Frame bytes, or `None` for a skipped frame.
    pub fn line(&self) -> Option<&[u8]> {
        match self {
            Frame::Line(bytes) => Some(bytes),
            Frame::Oversized { .. } => None,
        }
    }
}

/// Codec for framing records over a byte stream.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_bytes: usize,
    /// Bytes already scanned for a terminator in the current buffer.
    next_index: usize,
    /// Bytes thrown away from an oversized frame whose terminator has not
    /// arrived yet. `None` when not discarding.
    discarding: Option<usize>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_bytes(MAX_FRAME_BYTES)
    }

    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            next_index: 0,
            discarding: None,
        }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Check that `record` fits in one frame.
    pub fn check(&self, record: &Record) -> Result<usize, ProtocolError> {
        let size = record.to_wire()?.len();
        if size > self.max_frame_bytes {
            return Err(ProtocolError::MessageTooLarge {
                size,
                max: self.max_frame_bytes,
            });
        }
        Ok(size)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let found = src[self.next_index..]
            .iter()
            .position(|b| *b == TERMINATOR)
            .map(|offset| self.next_index + offset);

        if let Some(discarded) = self.discarding {
            return Ok(match found {
                Some(end) => {
                    src.advance(end + 1);
                    self.next_index = 0;
                    self.discarding = None;
                    Some(Frame::Oversized {
                        size: discarded + end,
                    })
                }
                None => {
                    self.discarding = Some(discarded + src.len());
                    self.next_index = 0;
                    src.clear();
                    None
                }
            });
        }

        match found {
            Some(end) => {
                self.next_index = 0;
                if end > self.max_frame_bytes {
                    src.advance(end + 1);
                    return Ok(Some(Frame::Oversized { size: end }));
                }
                let mut frame = src.split_to(end + 1);
                frame.truncate(end);
                Ok(Some(Frame::Line(frame)))
            }
            None if src.len() > self.max_frame_bytes => {
                self.discarding = Some(src.len());
                self.next_index = 0;
                src.clear();
                Ok(None)
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if let Some(size) = self.discarding.take() {
            src.clear();
            return Ok(Some(Frame::Oversized { size }));
        }
        // A peer that closes without a final newline still delivered a record.
        if src.iter().all(|b| *b == 0 || *b == b'\r') {
            src.clear();
            Ok(None)
        } else {
            Ok(Some(Frame::Line(src.split())))
        }
    }
}

impl Encoder<Record> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Record, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let text = item.to_wire()?;

        if text.len() > self.max_frame_bytes {
            return Err(ProtocolError::MessageTooLarge {
                size: text.len(),
                max: self.max_frame_bytes,
            });
        }

        dst.reserve(text.len() + 1);
        dst.extend_from_slice(text.as_bytes());
        dst.put_u8(TERMINATOR);

        Ok(())
    }
}
