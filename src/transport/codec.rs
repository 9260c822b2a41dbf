//! Length-prefixed frame codec for byte-stream transports.
//!
//! ```text
//! [Kind(1)] [Length(4, big-endian)] [Payload(N)]
//! ```

use crate::config::MAX_FRAME_SIZE;
use crate::core::frame::{Frame, FrameKind};
use crate::error::{DispatchError, Result};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const HEADER_LEN: usize = 5;

/// Encoder/decoder for [`Frame`]s
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = DispatchError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let len = frame.payload.len();
        if len > self.max_frame_size || len > u32::MAX as usize {
            return Err(DispatchError::OversizedFrame(len));
        }
        dst.reserve(HEADER_LEN + len);
        dst.put_u8(frame.kind.as_u8());
        dst.put_u32(len as u32);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = DispatchError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let kind = FrameKind::from_u8(src[0])?;
        let len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len > self.max_frame_size {
            return Err(DispatchError::OversizedFrame(len));
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        Ok(Some(Frame { kind, payload }))
    }
}
