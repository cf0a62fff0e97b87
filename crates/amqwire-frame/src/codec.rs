use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::EncodeError;

/// Protocol header opening an AMQP connection: "AMQP" 0 1 0 0.
pub const AMQP_HEADER: [u8; 8] = *b"AMQP\x00\x01\x00\x00";

/// Protocol header opening a SASL negotiation: "AMQP" 3 1 0 0.
pub const SASL_HEADER: [u8; 8] = *b"AMQP\x03\x01\x00\x00";

/// Length of the protocol header.
pub const PROTOCOL_HEADER_SIZE: usize = 8;

/// Width of the frame size field.
pub const SIZE_FIELD_SIZE: usize = 4;

/// Fixed frame header: size (4) + data offset (1) + type (1) + channel (2).
pub const FRAME_HEADER_SIZE: usize = 8;

/// Smallest legal value of the frame size field.
pub const MIN_FRAME_SIZE: u32 = FRAME_HEADER_SIZE as u32;

/// The only frame type this layer accepts.
pub const AMQP_FRAME_TYPE: u8 = 0;

/// Largest extended header that still fits a one-byte data offset.
pub const MAX_EXTENDED_HEADER: usize = 255 * 4 - FRAME_HEADER_SIZE;

/// Default input buffer capacity, the smallest max-frame-size a peer may offer.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024;

/// Default bound on frames reassembled beyond the input buffer (16 MiB).
pub const DEFAULT_MAX_REASSEMBLY_SIZE: usize = 16 * 1024 * 1024;

/// A decoded frame with channel routing.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<B> {
    /// The channel this frame belongs to.
    pub channel: u16,
    /// The decoded frame body. `None` for an empty (keepalive) frame.
    pub body: Option<B>,
    /// Raw bytes trailing the encoded body.
    pub payload: Option<Bytes>,
}

impl<B> Frame<B> {
    /// Create a frame carrying a body and no payload.
    pub fn new(channel: u16, body: B) -> Self {
        Self {
            channel,
            body: Some(body),
            payload: None,
        }
    }

    /// Create an empty frame.
    pub fn empty(channel: u16) -> Self {
        Self {
            channel,
            body: None,
            payload: None,
        }
    }

    /// Attach a trailing payload.
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Returns true if the frame carries neither body nor payload.
    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.payload.is_none()
    }

    /// Length of the trailing payload, zero when absent.
    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Bytes::len)
    }
}

/// Configuration for the frame parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Input buffer capacity in bytes. Default: 4 KiB.
    pub max_frame_size: usize,
    /// Reject frames whose declared size exceeds `max_frame_size`.
    pub enforce_max_frame_size: bool,
    /// Upper bound on declared frame size when `max_frame_size` is not
    /// enforced. Default: 16 MiB.
    pub max_reassembly_size: usize,
    /// Protocol header expected before the first frame.
    pub protocol_header: [u8; PROTOCOL_HEADER_SIZE],
}

impl FrameConfig {
    /// Configuration for a SASL negotiation stream.
    pub fn sasl() -> Self {
        Self {
            protocol_header: SASL_HEADER,
            ..Self::default()
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            enforce_max_frame_size: false,
            max_reassembly_size: DEFAULT_MAX_REASSEMBLY_SIZE,
            protocol_header: AMQP_HEADER,
        }
    }
}

/// Append a protocol header.
pub fn encode_protocol_header(header: &[u8; PROTOCOL_HEADER_SIZE], dst: &mut BytesMut) {
    dst.put_slice(header);
}

/// Encode a frame into the wire format.
///
/// The extended header is zero-padded to a four byte boundary.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────┬──────┬─────────┬──────────────┬──────┬─────────┐
/// │ Size      │ DOFF │ Type │ Channel │ Ext. header  │ Body │ Payload │
/// │ (4B BE)   │ (1B) │ (1B) │ (2B BE) │ (DOFF*4 - 8) │      │         │
/// └───────────┴──────┴──────┴─────────┴──────────────┴──────┴─────────┘
/// ```
pub fn encode_frame(
    channel: u16,
    extended_header: &[u8],
    body: &[u8],
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), EncodeError> {
    let padded = extended_header.len().next_multiple_of(4);
    if padded > MAX_EXTENDED_HEADER {
        return Err(EncodeError::ExtendedHeaderTooLarge {
            len: extended_header.len(),
            max: MAX_EXTENDED_HEADER,
        });
    }

    let data_offset = FRAME_HEADER_SIZE + padded;
    let size = data_offset + body.len() + payload.len();
    let wire_size = u32::try_from(size).map_err(|_| EncodeError::FrameTooLarge {
        size,
        max: u32::MAX as usize,
    })?;

    dst.reserve(size);
    dst.put_u32(wire_size);
    dst.put_u8((data_offset / 4) as u8);
    dst.put_u8(AMQP_FRAME_TYPE);
    dst.put_u16(channel);
    dst.put_slice(extended_header);
    dst.put_bytes(0, padded - extended_header.len());
    dst.put_slice(body);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a frame whose body is serialized as JSON.
pub fn encode_json_frame<T: Serialize + ?Sized>(
    channel: u16,
    body: &T,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), EncodeError> {
    let body = serde_json::to_vec(body)?;
    encode_frame(channel, &[], &body, payload, dst)
}
