//! Incremental frame decoding for AMQP 1.0 style transport framing.
//!
//! A connection opens with a fixed 8-byte protocol header, after which the
//! stream is a continuous sequence of frames:
//! - A 4-byte big-endian frame size, counting itself
//! - A 1-byte data offset in 4-byte words, a 1-byte type and a 2-byte channel
//! - An optional extended header, an encoded body and an optional raw payload
//!
//! [`FrameParser`] accepts the stream in arbitrarily sized pieces, resumes
//! mid-field across calls and hands complete frames to a [`FrameHandler`],
//! holding one frame back while the handler is not accepting.

pub mod body;
pub mod codec;
pub mod error;
pub mod handler;
pub mod parser;
pub mod reader;
pub mod trace;
pub mod writer;

pub use body::{BodyDecoder, Decoded, DecodedValue, JsonBodyDecoder};
pub use codec::{
    encode_frame, encode_json_frame, encode_protocol_header, Frame, FrameConfig, AMQP_HEADER,
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_REASSEMBLY_SIZE, FRAME_HEADER_SIZE, MIN_FRAME_SIZE,
    SASL_HEADER,
};
pub use error::{DecodeError, EncodeError, FrameError, ReadError, Result};
pub use handler::{FrameHandler, FrameQueue};
pub use parser::FrameParser;
pub use reader::{FrameReader, ReadStatus};
pub use trace::{Direction, FrameEvent, FrameTrace, NoTrace, RecordingTrace, TracingTrace};
pub use writer::FrameWriter;
