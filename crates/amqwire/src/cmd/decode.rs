use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use amqwire_frame::{
    FrameConfig, FrameParser, FrameQueue, FrameReader, JsonBodyDecoder, ReadError, ReadStatus,
    AMQP_HEADER, DEFAULT_MAX_FRAME_SIZE, SASL_HEADER,
};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, read_error, CliResult, SUCCESS};
use crate::output::{Body, FramePrinter, OutputFormat};

const QUEUE_CAPACITY: usize = 64;

type Reader<R> = FrameReader<R, JsonBodyDecoder<Body>, FrameQueue<Body>>;

/// Caps every read at `chunk` bytes so the parser sees a split stream.
struct ChunkedReader<R> {
    inner: R,
    chunk: usize,
}

impl<R: Read> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(self.chunk);
        self.inner.read(&mut buf[..len])
    }
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input: Box<dyn Read> = match args.input.as_deref() {
        Some(path) if path != Path::new("-") => Box::new(
            File::open(path).map_err(|err| io_error(&format!("open {}", path.display()), err))?,
        ),
        _ => Box::new(io::stdin().lock()),
    };
    let chunk = args
        .chunk_size
        .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

    let config = FrameConfig {
        max_frame_size: args.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME_SIZE),
        enforce_max_frame_size: args.max_frame_size.is_some(),
        protocol_header: if args.sasl { SASL_HEADER } else { AMQP_HEADER },
        ..FrameConfig::default()
    };
    tracing::debug!(
        max_frame_size = config.max_frame_size,
        chunk_size = ?args.chunk_size,
        sasl = args.sasl,
        "decoding stream"
    );

    let parser = FrameParser::with_config(
        JsonBodyDecoder::<Body>::new(),
        FrameQueue::new(QUEUE_CAPACITY),
        config,
    );
    let mut reader = FrameReader::new(ChunkedReader { inner: input, chunk }, parser);
    let mut printer = FramePrinter::new(format);

    let result = pump(&mut reader, &mut printer);
    let count = printer.count();
    printer.finish();
    result.map_err(|err| read_error("decode", err))?;

    tracing::info!(frames = count, "stream decoded");
    Ok(SUCCESS)
}

/// Read the whole stream, printing frames in arrival order.
///
/// Frames decoded before a failure are still printed.
fn pump<R: Read>(reader: &mut Reader<R>, printer: &mut FramePrinter) -> Result<(), ReadError> {
    loop {
        let status = reader.read_to_end();
        drain(reader, printer);
        match status? {
            ReadStatus::Full | ReadStatus::EofHeld => {
                let flushed = reader.parser_mut().flush();
                drain(reader, printer);
                flushed?;
            }
            ReadStatus::Eof => break,
            ReadStatus::Data(_) => {}
        }
    }

    while reader.parser().has_held_frame() {
        let flushed = reader.parser_mut().flush();
        drain(reader, printer);
        flushed?;
    }
    Ok(())
}

fn drain<R>(reader: &mut Reader<R>, printer: &mut FramePrinter) {
    for frame in reader.parser_mut().handler_mut().drain() {
        printer.print(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqwire_frame::{encode_json_frame, FrameError};
    use bytes::{BufMut, BytesMut};
    use serde_json::json;

    fn stream(frames: usize) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(&AMQP_HEADER);
        for i in 0..frames {
            encode_json_frame(i as u16, &json!({"seq": i}), b"", &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn reader(
        bytes: Vec<u8>,
        chunk: usize,
        queue: usize,
    ) -> Reader<ChunkedReader<io::Cursor<Vec<u8>>>> {
        let parser = FrameParser::new(JsonBodyDecoder::<Body>::new(), FrameQueue::new(queue));
        FrameReader::new(
            ChunkedReader {
                inner: io::Cursor::new(bytes),
                chunk,
            },
            parser,
        )
    }

    #[test]
    fn chunked_reader_caps_reads() {
        let mut chunked = ChunkedReader {
            inner: io::Cursor::new(vec![1u8; 10]),
            chunk: 3,
        };
        let mut buf = [0u8; 8];
        assert_eq!(chunked.read(&mut buf).unwrap(), 3);
    }

    #[test]
    fn pump_prints_every_frame_behind_small_queue() {
        let mut reader = reader(stream(200), 7, 1);
        let mut printer = FramePrinter::new(OutputFormat::Table);

        pump(&mut reader, &mut printer).unwrap();
        assert_eq!(printer.count(), 200);
    }

    #[test]
    fn pump_reports_truncated_stream() {
        let mut bytes = stream(2);
        bytes.truncate(bytes.len() - 3);
        let mut reader = reader(bytes, 5, 8);
        let mut printer = FramePrinter::new(OutputFormat::Table);

        let err = pump(&mut reader, &mut printer).unwrap_err();
        assert!(matches!(err, ReadError::ConnectionClosed));
        assert_eq!(printer.count(), 1);
    }

    #[test]
    fn pump_reports_truncation_behind_held_frame() {
        let mut bytes = stream(3);
        bytes.truncate(bytes.len() - 3);
        let mut reader = reader(bytes, 4096, 1);
        let mut printer = FramePrinter::new(OutputFormat::Table);

        let err = pump(&mut reader, &mut printer).unwrap_err();
        assert!(matches!(err, ReadError::ConnectionClosed));
        assert_eq!(printer.count(), 2);
    }

    #[test]
    fn pump_reports_framing_error_after_good_frames() {
        let mut bytes = stream(1);
        bytes.extend_from_slice(&[0, 0, 0, 8, 2, 1, 0, 0]);
        let mut reader = reader(bytes, 4, 8);
        let mut printer = FramePrinter::new(OutputFormat::Table);

        let err = pump(&mut reader, &mut printer).unwrap_err();
        assert!(matches!(err, ReadError::Frame(FrameError::UnknownFrameType(1))));
        assert_eq!(printer.count(), 1);
    }
}
