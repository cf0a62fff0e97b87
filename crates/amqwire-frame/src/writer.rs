use std::fmt::Debug;
use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use serde::Serialize;

use crate::codec::{encode_frame, AMQP_HEADER, PROTOCOL_HEADER_SIZE};
use crate::error::EncodeError;
use crate::trace::{Direction, FrameEvent, FrameTrace, TracingTrace};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes the protocol header and complete frames to any `Write` stream.
///
/// The protocol header is sent lazily, right before the first frame.
pub struct FrameWriter<W, T = TracingTrace> {
    inner: W,
    buf: BytesMut,
    protocol_header: [u8; PROTOCOL_HEADER_SIZE],
    header_sent: bool,
    trace: T,
}

impl<W: Write> FrameWriter<W, TracingTrace> {
    /// Create a writer that opens the stream with the AMQP header.
    pub fn new(inner: W) -> Self {
        Self::with_protocol_header(inner, AMQP_HEADER)
    }

    /// Create a writer with an explicit protocol header.
    pub fn with_protocol_header(inner: W, protocol_header: [u8; PROTOCOL_HEADER_SIZE]) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            protocol_header,
            header_sent: false,
            trace: TracingTrace,
        }
    }
}

impl<W: Write, T: FrameTrace> FrameWriter<W, T> {
    /// Replace the trace sink.
    pub fn with_trace<U: FrameTrace>(self, trace: U) -> FrameWriter<W, U> {
        FrameWriter {
            inner: self.inner,
            buf: self.buf,
            protocol_header: self.protocol_header,
            header_sent: self.header_sent,
            trace,
        }
    }

    /// Treat the protocol header as already exchanged.
    pub fn skip_protocol_header(mut self) -> Self {
        self.header_sent = true;
        self
    }

    /// Encode `body` as JSON and send it with a trailing payload.
    pub fn send<B>(&mut self, channel: u16, body: &B, payload: &[u8]) -> Result<(), EncodeError>
    where
        B: Serialize + Debug + ?Sized,
    {
        let encoded = serde_json::to_vec(body)?;
        self.send_raw(channel, &[], &encoded, payload)?;
        self.trace.on_frame(&FrameEvent {
            direction: Direction::Outgoing,
            channel,
            body: Some(&body),
            payload_len: (!payload.is_empty()).then_some(payload.len()),
        });
        Ok(())
    }

    /// Send an empty frame, e.g. as a keepalive.
    pub fn send_empty(&mut self, channel: u16) -> Result<(), EncodeError> {
        self.send_raw(channel, &[], &[], &[])?;
        self.trace.on_frame(&FrameEvent {
            direction: Direction::Outgoing,
            channel,
            body: None,
            payload_len: None,
        });
        Ok(())
    }

    /// Send a frame whose body is already encoded.
    pub fn send_raw(
        &mut self,
        channel: u16,
        extended_header: &[u8],
        body: &[u8],
        payload: &[u8],
    ) -> Result<(), EncodeError> {
        self.buf.clear();
        if !self.header_sent {
            self.buf.extend_from_slice(&self.protocol_header);
        }
        encode_frame(channel, extended_header, body, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(EncodeError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(EncodeError::Io(err)),
            }
        }
        self.header_sent = true;

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<(), EncodeError> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(EncodeError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn trace(&self) -> &T {
        &self.trace
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
