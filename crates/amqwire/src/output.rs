use std::io::{IsTerminal, Write};

use amqwire_frame::Frame;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::{Map, Value};

pub type Body = Map<String, Value>;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    index: usize,
    channel: u16,
    body: Option<&'a Body>,
    payload_size: usize,
    payload: Option<String>,
}

/// Prints decoded frames as they arrive.
///
/// Table output is buffered and rendered by [`FramePrinter::finish`].
pub struct FramePrinter {
    format: OutputFormat,
    table: Option<Table>,
    count: usize,
}

impl FramePrinter {
    pub fn new(format: OutputFormat) -> Self {
        let table = matches!(format, OutputFormat::Table).then(|| {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "CHANNEL", "BODY", "PAYLOAD"]);
            table
        });
        Self {
            format,
            table,
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn print(&mut self, frame: &Frame<Body>) {
        let index = self.count;
        self.count += 1;

        match self.format {
            OutputFormat::Json => {
                let out = FrameOutput {
                    index,
                    channel: frame.channel,
                    body: frame.body.as_ref(),
                    payload_size: frame.payload_len(),
                    payload: frame.payload.as_deref().map(payload_preview),
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Table => {
                if let Some(table) = self.table.as_mut() {
                    table.add_row(vec![
                        index.to_string(),
                        frame.channel.to_string(),
                        body_preview(frame.body.as_ref()),
                        frame
                            .payload
                            .as_deref()
                            .map(payload_preview)
                            .unwrap_or_default(),
                    ]);
                }
            }
            OutputFormat::Pretty => {
                println!(
                    "#{index} channel={} body={} payload={}",
                    frame.channel,
                    body_preview(frame.body.as_ref()),
                    frame
                        .payload
                        .as_deref()
                        .map(payload_preview)
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            OutputFormat::Raw => {
                if let Some(payload) = frame.payload.as_deref() {
                    print_raw(payload);
                }
            }
        }
    }

    pub fn finish(self) {
        if let Some(table) = self.table {
            if self.count > 0 {
                println!("{table}");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn body_preview(body: Option<&Body>) -> String {
    match body {
        Some(body) => serde_json::to_string(body).unwrap_or_else(|_| "<unprintable>".to_string()),
        None => "(empty)".to_string(),
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_payloads_are_summarised() {
        assert_eq!(payload_preview(b"hello"), "hello");
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }

    #[test]
    fn empty_frames_preview_as_empty() {
        assert_eq!(body_preview(None), "(empty)");
    }

    #[test]
    fn printer_counts_frames() {
        let mut printer = FramePrinter::new(OutputFormat::Table);
        printer.print(&Frame::empty(0));
        printer.print(&Frame::empty(1));
        assert_eq!(printer.count(), 2);
    }
}
