//! Frame codec for the ESPHome native API: a one-byte preamble, a
//! varint-encoded payload length, a varint-encoded message type, then the
//! raw payload bytes.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::EsphomeError;
use crate::proto::{decode_varint, encode_varint};

const PREAMBLE: u8 = 0x00;

/// One decoded/encoded frame: a message type and its protobuf-shaped payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub message_type: u32,
    pub payload: Bytes,
}

impl Frame {
    #[must_use]
    pub fn new(message_type: u32, payload: Bytes) -> Self {
        Self { message_type, payload }
    }
}

#[derive(Debug, Default)]
pub struct EsphomeCodec;

impl Decoder for EsphomeCodec {
    type Item = Frame;
    type Error = EsphomeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, EsphomeError> {
        if src.is_empty() {
            return Ok(None);
        }
        if src[0] != PREAMBLE {
            return Err(EsphomeError::Codec(format!(
                "expected preamble byte 0x00, got {:#04x}",
                src[0]
            )));
        }

        let Some((len, len_size)) = decode_varint(&src[1..]) else {
            return Ok(None);
        };
        let Some((message_type, type_size)) = decode_varint(&src[1 + len_size..]) else {
            return Ok(None);
        };

        let header_size = 1 + len_size + type_size;
        let payload_len = len as usize;
        let total = header_size + payload_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(header_size);
        let payload = src.split_to(payload_len).freeze();

        Ok(Some(Frame::new(message_type as u32, payload)))
    }
}

impl Encoder<Frame> for EsphomeCodec {
    type Error = EsphomeError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), EsphomeError> {
        dst.reserve(1 + frame.payload.len() + 10);
        dst.extend_from_slice(&[PREAMBLE]);
        encode_varint(frame.payload.len() as u64, dst);
        encode_varint(u64::from(frame.message_type), dst);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}
