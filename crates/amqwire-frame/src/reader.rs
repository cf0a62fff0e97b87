use std::fmt::Debug;
use std::io::{ErrorKind, Read};

use crate::body::BodyDecoder;
use crate::error::ReadError;
use crate::handler::FrameHandler;
use crate::parser::FrameParser;
use crate::trace::{FrameTrace, TracingTrace};

/// Outcome of one read from the underlying stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// `n` bytes were read and processed.
    Data(usize),
    /// The stream reported end of file.
    Eof,
    /// The input buffer is full behind a held frame; drain the handler first.
    Full,
    /// The stream ended with unparsed bytes behind a held frame. Drain the
    /// handler, `flush`, and read again to learn whether the stream was
    /// truncated.
    EofHeld,
}

/// Pumps bytes from a stream into a [`FrameParser`].
///
/// Reads land directly in the parser's input buffer, so no intermediate
/// copy is made.
pub struct FrameReader<R, D: BodyDecoder, H, T = TracingTrace> {
    inner: R,
    parser: FrameParser<D, H, T>,
}

impl<R, D, H, T> FrameReader<R, D, H, T>
where
    D: BodyDecoder,
    D::Body: Debug,
    H: FrameHandler<D::Body>,
    T: FrameTrace,
{
    pub fn new(inner: R, parser: FrameParser<D, H, T>) -> Self {
        Self { inner, parser }
    }

    /// Borrow the parser.
    pub fn parser(&self) -> &FrameParser<D, H, T> {
        &self.parser
    }

    /// Mutably borrow the parser, e.g. to drain its handler.
    pub fn parser_mut(&mut self) -> &mut FrameParser<D, H, T> {
        &mut self.parser
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the stream and parser.
    pub fn into_parts(self) -> (R, FrameParser<D, H, T>) {
        (self.inner, self.parser)
    }

    fn commit(&mut self, read: usize) -> Result<ReadStatus, ReadError> {
        if read == 0 {
            return Ok(ReadStatus::Eof);
        }
        self.parser.commit_input(read)?;
        Ok(ReadStatus::Data(read))
    }

    fn finish(&self) -> Result<ReadStatus, ReadError> {
        if self.parser.is_at_frame_boundary() {
            Ok(ReadStatus::Eof)
        } else if self.parser.has_held_frame() {
            Ok(ReadStatus::EofHeld)
        } else {
            Err(ReadError::ConnectionClosed)
        }
    }
}

impl<R, D, H, T> FrameReader<R, D, H, T>
where
    R: Read,
    D: BodyDecoder,
    D::Body: Debug,
    H: FrameHandler<D::Body>,
    T: FrameTrace,
{
    /// Perform one read (blocking) and process the bytes.
    pub fn read_available(&mut self) -> Result<ReadStatus, ReadError> {
        loop {
            let region = self.parser.writable_region()?;
            if region.is_empty() {
                return Ok(ReadStatus::Full);
            }

            let read = match self.inner.read(region) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ReadError::Io(err)),
            };
            return self.commit(read);
        }
    }

    /// Read until end of stream or until a held frame fills the buffer.
    ///
    /// Returns `Err(ReadError::ConnectionClosed)` when the stream ends in
    /// the middle of a frame, and [`ReadStatus::EofHeld`] when that cannot
    /// be decided until the held frame is delivered.
    pub fn read_to_end(&mut self) -> Result<ReadStatus, ReadError> {
        loop {
            match self.read_available()? {
                ReadStatus::Data(_) => continue,
                ReadStatus::Eof | ReadStatus::EofHeld => return self.finish(),
                ReadStatus::Full => return Ok(ReadStatus::Full),
            }
        }
    }
}

#[cfg(feature = "async")]
impl<R, D, H, T> FrameReader<R, D, H, T>
where
    R: tokio::io::AsyncRead + Unpin,
    D: BodyDecoder,
    D::Body: Debug,
    H: FrameHandler<D::Body>,
    T: FrameTrace,
{
    /// Perform one read and process the bytes.
    pub async fn read_available_async(&mut self) -> Result<ReadStatus, ReadError> {
        use tokio::io::AsyncReadExt;

        loop {
            let region = self.parser.writable_region()?;
            if region.is_empty() {
                return Ok(ReadStatus::Full);
            }

            let read = match self.inner.read(region).await {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ReadError::Io(err)),
            };
            return self.commit(read);
        }
    }

    /// Read until end of stream or until a held frame fills the buffer.
    pub async fn read_to_end_async(&mut self) -> Result<ReadStatus, ReadError> {
        loop {
            match self.read_available_async().await? {
                ReadStatus::Data(_) => continue,
                ReadStatus::Eof | ReadStatus::EofHeld => return self.finish(),
                ReadStatus::Full => return Ok(ReadStatus::Full),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::body::JsonBodyDecoder;
    use crate::codec::{encode_json_frame, Frame, FrameConfig, AMQP_HEADER};
    use crate::error::FrameError;
    use crate::handler::FrameQueue;
    use crate::trace::NoTrace;

    type Body = Map<String, Value>;

    fn wire(frames: &[(u16, Value)]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(&AMQP_HEADER);
        for (channel, body) in frames {
            encode_json_frame(*channel, body, b"", &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn parser() -> FrameParser<JsonBodyDecoder<Body>, Vec<Frame<Body>>, NoTrace> {
        FrameParser::new(JsonBodyDecoder::new(), Vec::new()).with_trace(NoTrace)
    }

    #[test]
    fn read_multiple_frames() {
        let bytes = wire(&[(1, json!({"one": 1})), (2, json!({"two": 2}))]);
        let mut reader = FrameReader::new(Cursor::new(bytes), parser());

        assert_eq!(reader.read_to_end().unwrap(), ReadStatus::Eof);

        let channels: Vec<u16> = reader.parser().handler().iter().map(|f| f.channel).collect();
        assert_eq!(channels, vec![1, 2]);
    }

    #[test]
    fn partial_read_handling() {
        let bytes = wire(&[(4, json!({"slow": true}))]);
        let byte_reader = ByteByByteReader { bytes, pos: 0 };
        let mut reader = FrameReader::new(byte_reader, parser());

        reader.read_to_end().unwrap();
        assert_eq!(reader.parser().handler()[0].channel, 4);
    }

    #[test]
    fn empty_stream_is_clean() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()), parser());
        assert_eq!(reader.read_to_end().unwrap(), ReadStatus::Eof);
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut bytes = wire(&[(2, json!({"cut": "here"}))]);
        bytes.truncate(bytes.len() - 3);

        let mut reader = FrameReader::new(Cursor::new(bytes), parser());
        let err = reader.read_to_end().unwrap_err();
        assert!(matches!(err, ReadError::ConnectionClosed));
    }

    type QueueReader =
        FrameReader<Cursor<Vec<u8>>, JsonBodyDecoder<Body>, FrameQueue<Body>, NoTrace>;

    fn drain_channels(reader: &mut QueueReader, seen: &mut Vec<u16>) {
        seen.extend(reader.parser_mut().handler_mut().drain().map(|f| f.channel));
    }

    #[test]
    fn truncation_behind_held_frame_is_reported() {
        let mut bytes = wire(&[(1, json!({"a": 1})), (2, json!({"b": 2})), (3, json!({"c": 3}))]);
        bytes.truncate(bytes.len() - 3);
        let parser = FrameParser::new(JsonBodyDecoder::<Body>::new(), FrameQueue::new(1))
            .with_trace(NoTrace);
        let mut reader = FrameReader::new(Cursor::new(bytes), parser);

        assert_eq!(reader.read_to_end().unwrap(), ReadStatus::EofHeld);
        assert!(reader.parser().has_held_frame());

        let mut seen = Vec::new();
        drain_channels(&mut reader, &mut seen);
        reader.parser_mut().flush().unwrap();
        drain_channels(&mut reader, &mut seen);

        let err = reader.read_to_end().unwrap_err();
        assert!(matches!(err, ReadError::ConnectionClosed));
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn complete_frames_behind_held_frame_end_cleanly() {
        let bytes = wire(&[(1, json!({"a": 1})), (2, json!({"b": 2})), (3, json!({"c": 3}))]);
        let parser = FrameParser::new(JsonBodyDecoder::<Body>::new(), FrameQueue::new(1))
            .with_trace(NoTrace);
        let mut reader = FrameReader::new(Cursor::new(bytes), parser);

        assert_eq!(reader.read_to_end().unwrap(), ReadStatus::EofHeld);

        let mut seen = Vec::new();
        drain_channels(&mut reader, &mut seen);
        reader.parser_mut().flush().unwrap();
        assert_eq!(reader.read_to_end().unwrap(), ReadStatus::Eof);

        drain_channels(&mut reader, &mut seen);
        reader.parser_mut().flush().unwrap();
        drain_channels(&mut reader, &mut seen);
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(!reader.parser().has_held_frame());
    }

    #[test]
    fn connection_closed_mid_header() {
        let mut reader = FrameReader::new(Cursor::new(b"AMQ".to_vec()), parser());
        let err = reader.read_to_end().unwrap_err();
        assert!(matches!(err, ReadError::ConnectionClosed));
    }

    #[test]
    fn invalid_header_in_stream() {
        let mut reader = FrameReader::new(Cursor::new(b"HTTP/1.1".to_vec()), parser());
        let err = reader.read_to_end().unwrap_err();
        assert!(matches!(
            err,
            ReadError::Frame(FrameError::HeaderMismatch { position: 0, .. })
        ));
    }

    #[test]
    fn full_buffer_behind_held_frame() {
        let frames: Vec<(u16, Value)> = (0..8).map(|c| (c, json!({}))).collect();
        let bytes = wire(&frames);
        let config = FrameConfig {
            max_frame_size: 16,
            ..FrameConfig::default()
        };
        let parser = FrameParser::with_config(
            JsonBodyDecoder::<Body>::new(),
            FrameQueue::new(1),
            config,
        )
        .with_trace(NoTrace);
        let mut reader = FrameReader::new(Cursor::new(bytes), parser);

        assert_eq!(reader.read_to_end().unwrap(), ReadStatus::Full);

        let mut seen = Vec::new();
        loop {
            while let Some(frame) = reader.parser_mut().handler_mut().pop() {
                seen.push(frame.channel);
            }
            reader.parser_mut().flush().unwrap();
            if reader.read_to_end().unwrap() == ReadStatus::Eof
                && reader.parser().handler().is_empty()
                && !reader.parser().has_held_frame()
            {
                break;
            }
        }
        assert_eq!(seen, (0..8).collect::<Vec<u16>>());
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let reader = WouldBlockOnce {
            blocked: false,
            inner: Cursor::new(wire(&[(7, json!({"ok": true}))])),
        };
        let mut framed = FrameReader::new(reader, parser());
        let err = framed.read_available().unwrap_err();
        assert!(matches!(err, ReadError::Io(e) if e.kind() == ErrorKind::WouldBlock));

        framed.read_to_end().unwrap();
        assert_eq!(framed.parser().handler()[0].channel, 7);
    }

    struct WouldBlockOnce {
        blocked: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for WouldBlockOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.blocked {
                self.blocked = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedOnce {
            interrupted: false,
            inner: Cursor::new(wire(&[(8, json!({"ok": true}))])),
        };
        let mut framed = FrameReader::new(reader, parser());

        assert_eq!(framed.read_available().unwrap(), ReadStatus::Data(27));
        assert_eq!(framed.parser().handler()[0].channel, 8);
    }

    struct InterruptedOnce {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left).with_trace(NoTrace);
        let mut reader = FrameReader::new(right, parser());

        writer.send(1, &json!({"ping": 1}), b"").unwrap();
        drop(writer);

        reader.read_to_end().unwrap();
        assert_eq!(reader.parser().handler()[0].channel, 1);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_read_to_end() {
        let bytes = wire(&[(3, json!({"a": 1})), (5, json!({"b": 2}))]);
        let mut reader = FrameReader::new(bytes.as_slice(), parser());

        assert_eq!(reader.read_to_end_async().await.unwrap(), ReadStatus::Eof);
        let channels: Vec<u16> = reader.parser().handler().iter().map(|f| f.channel).collect();
        assert_eq!(channels, vec![3, 5]);
    }
}
