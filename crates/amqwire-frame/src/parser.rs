//! Resumable inbound frame parser.
//!
//! The parser owns a fixed-size input buffer that the transport fills. Each
//! call to [`FrameParser::process_input`] consumes whatever bytes are
//! present, keeping enough state to resume byte-for-byte on the next call:
//!
//! ```text
//! Header{0..8} ──▶ Size{0..4} ──▶ PreParse ──┬──────────────▶ Parsing ──▶ Size{0}
//!                                            └─▶ Buffering ──▶┘
//! ```
//!
//! Any violation moves the parser to `Failed`, which it never leaves.

use std::fmt::Debug;

use bytes::{Buf, Bytes, BytesMut};

use crate::body::{BodyDecoder, DecodedValue};
use crate::codec::{
    Frame, FrameConfig, AMQP_FRAME_TYPE, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE,
    MIN_FRAME_SIZE, PROTOCOL_HEADER_SIZE, SIZE_FIELD_SIZE,
};
use crate::error::{DecodeError, FrameError, Result};
use crate::handler::FrameHandler;
use crate::trace::{Direction, FrameEvent, FrameTrace, TracingTrace};

#[derive(Debug)]
enum State {
    /// `matched` protocol header bytes seen so far.
    Header { matched: usize },
    /// `read` bytes of the size field shifted into the pending size.
    Size { read: usize },
    PreParse,
    /// Frame content arriving in pieces.
    Buffering(BytesMut),
    /// Frame content complete, either in the live input or reassembled.
    Parsing(Option<Bytes>),
    Failed,
}

impl State {
    fn needs_input(&self) -> bool {
        !matches!(self, State::PreParse | State::Parsing(_))
    }
}

/// A contiguous cursor over the content of exactly one frame.
trait FrameSource: Buf {}

impl FrameSource for &[u8] {}

impl FrameSource for Bytes {}

/// Incremental decoder for the inbound side of a connection.
pub struct FrameParser<D: BodyDecoder, H, T = TracingTrace> {
    decoder: D,
    handler: H,
    trace: T,
    config: FrameConfig,
    input: Box<[u8]>,
    filled: usize,
    state: State,
    size: u32,
    held: Option<Frame<D::Body>>,
    last_result: Result<()>,
}

impl<D, H> FrameParser<D, H, TracingTrace>
where
    D: BodyDecoder,
    H: FrameHandler<D::Body>,
{
    /// Create a parser with default configuration.
    pub fn new(decoder: D, handler: H) -> Self {
        Self::with_config(decoder, handler, FrameConfig::default())
    }

    /// Create a parser with explicit configuration.
    ///
    /// A `max_frame_size` of zero selects the default input buffer size.
    pub fn with_config(decoder: D, handler: H, mut config: FrameConfig) -> Self {
        if config.max_frame_size == 0 {
            config.max_frame_size = DEFAULT_MAX_FRAME_SIZE;
        }

        Self {
            decoder,
            handler,
            trace: TracingTrace,
            input: vec![0; config.max_frame_size].into_boxed_slice(),
            config,
            filled: 0,
            state: State::Header { matched: 0 },
            size: 0,
            held: None,
            last_result: Ok(()),
        }
    }
}

impl<D, H, T> FrameParser<D, H, T>
where
    D: BodyDecoder,
    D::Body: Debug,
    H: FrameHandler<D::Body>,
    T: FrameTrace,
{
    /// Replace the trace sink.
    pub fn with_trace<U: FrameTrace>(self, trace: U) -> FrameParser<D, H, U> {
        FrameParser {
            decoder: self.decoder,
            handler: self.handler,
            trace,
            config: self.config,
            input: self.input,
            filled: self.filled,
            state: self.state,
            size: self.size,
            held: self.held,
            last_result: self.last_result,
        }
    }

    /// Free space in the input buffer for the transport to fill.
    ///
    /// Fails with the last error once the parser is broken.
    pub fn writable_region(&mut self) -> Result<&mut [u8]> {
        self.last_result.clone()?;
        Ok(&mut self.input[self.filled..])
    }

    /// Mark `written` bytes of the writable region as filled, then process.
    pub fn commit_input(&mut self, written: usize) -> Result<()> {
        let free = self.input.len() - self.filled;
        debug_assert!(written <= free, "committed {written} bytes into {free} free");
        self.filled += written.min(free);
        self.process_input()
    }

    /// Copy `bytes` into the input buffer and process them.
    ///
    /// When a held frame keeps the input buffer full, returns
    /// [`FrameError::InputBufferFull`] with the number of bytes taken; the
    /// rest can be fed again after the handler drains.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Result<()> {
        if self.is_failed() {
            return Err(FrameError::PreviouslyFailed);
        }

        let total = bytes.len();
        loop {
            let take = (self.input.len() - self.filled).min(bytes.len());
            self.input[self.filled..self.filled + take].copy_from_slice(&bytes[..take]);
            self.filled += take;
            bytes = &bytes[take..];

            self.process_input()?;

            if bytes.is_empty() {
                return Ok(());
            }
            if self.filled == self.input.len() {
                return Err(FrameError::InputBufferFull {
                    accepted: total - bytes.len(),
                });
            }
        }
    }

    /// Process everything currently in the input buffer.
    pub fn process_input(&mut self) -> Result<()> {
        self.flush_held_frame();
        let result = if self.held.is_some() {
            Ok(())
        } else {
            self.run()
        };
        self.last_result = result.clone();
        result
    }

    /// Deliver a held frame and continue with leftover input.
    ///
    /// Call this when the handler starts accepting again outside of a
    /// `feed`/`commit_input` call.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_held_frame();
        if self.held.is_none() {
            self.last_result.clone()?;
            self.process_input()?;
        }
        Ok(())
    }

    fn flush_held_frame(&mut self) {
        if self.held.is_some() && self.handler.is_accepting() {
            if let Some(frame) = self.held.take() {
                self.handler.handle_frame(frame);
            }
        }
    }

    fn run(&mut self) -> Result<()> {
        if self.is_failed() {
            return Err(FrameError::PreviouslyFailed);
        }

        let mut pos = 0;
        let mut result = Ok(());
        while self.held.is_none() && (pos < self.filled || !self.state.needs_input()) {
            if let Err(err) = self.step(&mut pos) {
                tracing::debug!(error = %err, "frame parsing failed");
                result = Err(err);
                break;
            }
        }

        self.input.copy_within(pos..self.filled, 0);
        self.filled -= pos;
        result
    }

    /// Advance by one transition. Leaves `Failed` behind on error.
    fn step(&mut self, pos: &mut usize) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Failed) {
            State::Header { matched } => {
                let actual = self.input[*pos];
                let expected = self.config.protocol_header[matched];
                if actual != expected {
                    return Err(FrameError::HeaderMismatch {
                        position: matched,
                        expected,
                        actual,
                    });
                }
                *pos += 1;

                self.state = if matched + 1 == PROTOCOL_HEADER_SIZE {
                    self.size = 0;
                    State::Size { read: 0 }
                } else {
                    State::Header {
                        matched: matched + 1,
                    }
                };
            }
            State::Size { read } => {
                let available = &self.input[*pos..self.filled];
                if read == 0 && available.len() >= SIZE_FIELD_SIZE {
                    self.size = (&available[..SIZE_FIELD_SIZE]).get_u32();
                    *pos += SIZE_FIELD_SIZE;
                    self.state = State::PreParse;
                } else {
                    self.size = (self.size << 8) | u32::from(available[0]);
                    *pos += 1;
                    self.state = if read + 1 == SIZE_FIELD_SIZE {
                        State::PreParse
                    } else {
                        State::Size { read: read + 1 }
                    };
                }
            }
            State::PreParse => {
                let size = self.size;
                if size < MIN_FRAME_SIZE {
                    return Err(FrameError::FrameTooSmall {
                        size,
                        min: MIN_FRAME_SIZE,
                    });
                }
                let max = if self.config.enforce_max_frame_size {
                    self.config.max_frame_size
                } else {
                    self.config.max_reassembly_size
                };
                if size as usize > max {
                    return Err(FrameError::FrameTooLarge { size, max });
                }

                let content = size as usize - SIZE_FIELD_SIZE;
                if self.filled - *pos >= content {
                    self.state = State::Parsing(None);
                } else {
                    let mut buffer = BytesMut::with_capacity(content);
                    buffer.extend_from_slice(&self.input[*pos..self.filled]);
                    *pos = self.filled;
                    self.state = State::Buffering(buffer);
                }
            }
            State::Buffering(mut buffer) => {
                let wanted = self.size as usize - SIZE_FIELD_SIZE - buffer.len();
                let take = wanted.min(self.filled - *pos);
                buffer.extend_from_slice(&self.input[*pos..*pos + take]);
                *pos += take;

                self.state = if take == wanted {
                    State::Parsing(Some(buffer.freeze()))
                } else {
                    State::Buffering(buffer)
                };
            }
            State::Parsing(reassembled) => {
                let size = self.size;
                let frame = match reassembled {
                    Some(content) => parse_frame(&mut self.decoder, content, size)?,
                    None => {
                        let end = *pos + size as usize - SIZE_FIELD_SIZE;
                        let frame = parse_frame(&mut self.decoder, &self.input[*pos..end], size)?;
                        *pos = end;
                        frame
                    }
                };

                self.trace_frame(&frame);
                self.deliver(frame);
                self.size = 0;
                self.state = State::Size { read: 0 };
            }
            State::Failed => return Err(FrameError::PreviouslyFailed),
        }
        Ok(())
    }

    fn trace_frame(&mut self, frame: &Frame<D::Body>) {
        self.trace.on_frame(&FrameEvent {
            direction: Direction::Incoming,
            channel: frame.channel,
            body: frame.body.as_ref().map(|body| body as &dyn Debug),
            payload_len: frame.payload.as_ref().map(Bytes::len),
        });
    }

    fn deliver(&mut self, frame: Frame<D::Body>) {
        if self.handler.is_accepting() {
            self.handler.handle_frame(frame);
        } else {
            tracing::debug!(channel = frame.channel, "handler not accepting, holding frame");
            self.held = Some(frame);
        }
    }

    /// True once a terminal error has been reported.
    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    /// True when no partial header or frame has been received.
    pub fn is_at_frame_boundary(&self) -> bool {
        self.filled == 0
            && matches!(
                self.state,
                State::Header { matched: 0 } | State::Size { read: 0 }
            )
    }

    /// True while a decoded frame waits for the handler.
    pub fn has_held_frame(&self) -> bool {
        self.held.is_some()
    }

    /// The frame waiting for the handler, if any.
    pub fn held_frame(&self) -> Option<&Frame<D::Body>> {
        self.held.as_ref()
    }

    /// Bytes in the input buffer not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.filled
    }

    /// Fixed capacity of the input buffer.
    pub fn capacity(&self) -> usize {
        self.input.len()
    }

    /// Outcome of the most recent processing call.
    pub fn last_result(&self) -> &Result<()> {
        &self.last_result
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn trace(&self) -> &T {
        &self.trace
    }

    /// Consume the parser and return its collaborators.
    pub fn into_parts(self) -> (D, H, T) {
        (self.decoder, self.handler, self.trace)
    }
}

/// Lift one frame out of exactly `size - 4` bytes of frame content.
fn parse_frame<D, S>(decoder: &mut D, mut src: S, size: u32) -> Result<Frame<D::Body>>
where
    D: BodyDecoder,
    S: FrameSource,
{
    let data_offset = usize::from(src.get_u8()) * 4;
    if data_offset < FRAME_HEADER_SIZE {
        return Err(FrameError::DataOffsetTooSmall {
            offset: data_offset,
            min: FRAME_HEADER_SIZE,
        });
    }
    if data_offset > size as usize {
        return Err(FrameError::DataOffsetTooLarge {
            offset: data_offset,
            size,
        });
    }

    let frame_type = src.get_u8();
    let channel = src.get_u16();
    if frame_type != AMQP_FRAME_TYPE {
        return Err(FrameError::UnknownFrameType(frame_type));
    }

    // extended header
    src.advance(data_offset - FRAME_HEADER_SIZE);

    let body_len = src.remaining();
    if body_len == 0 {
        return Ok(Frame::empty(channel));
    }

    let decoded = decoder
        .decode(src.chunk())
        .map_err(FrameError::BodyDecode)?;
    if decoded.consumed > body_len {
        return Err(FrameError::BodyDecode(DecodeError::new(format!(
            "decoder consumed {} bytes of a {body_len} byte body",
            decoded.consumed
        ))));
    }

    let body = match decoded.value {
        DecodedValue::Body(body) => body,
        DecodedValue::Other { kind } => return Err(FrameError::UnexpectedBody { kind }),
        DecodedValue::Null => {
            return Err(FrameError::UnexpectedBody {
                kind: "null".to_string(),
            })
        }
    };

    src.advance(decoded.consumed);
    let payload = if src.has_remaining() {
        Some(src.copy_to_bytes(src.remaining()))
    } else {
        None
    };

    Ok(Frame {
        channel,
        body: Some(body),
        payload,
    })
}
