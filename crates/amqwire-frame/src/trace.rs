//! Frame tracing.
//!
//! The parser and writer report every frame to an injected [`FrameTrace`]
//! instead of logging through global state. [`TracingTrace`] forwards the
//! events to `tracing` at TRACE level.

use std::fmt;

/// Which way a frame travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Incoming => "IN",
            Direction::Outgoing => "OUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of one frame.
#[derive(Clone, Copy)]
pub struct FrameEvent<'a> {
    pub direction: Direction,
    pub channel: u16,
    /// The frame body, `None` for empty frames.
    pub body: Option<&'a dyn fmt::Debug>,
    /// Length of the trailing payload, `None` when absent.
    pub payload_len: Option<usize>,
}

impl fmt::Debug for FrameEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameEvent")
            .field("direction", &self.direction)
            .field("channel", &self.channel)
            .field("body", &self.body)
            .field("payload_len", &self.payload_len)
            .finish()
    }
}

/// Sink for frame trace events.
pub trait FrameTrace {
    fn on_frame(&mut self, event: &FrameEvent<'_>);
}

impl<T: FrameTrace + ?Sized> FrameTrace for &mut T {
    fn on_frame(&mut self, event: &FrameEvent<'_>) {
        (**self).on_frame(event);
    }
}

/// Emits frame events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTrace;

impl FrameTrace for TracingTrace {
    fn on_frame(&mut self, event: &FrameEvent<'_>) {
        match event.body {
            Some(body) => tracing::trace!(
                direction = event.direction.as_str(),
                channel = event.channel,
                body = ?body,
                payload_len = ?event.payload_len,
                "frame"
            ),
            None => tracing::trace!(
                direction = event.direction.as_str(),
                channel = event.channel,
                "empty frame"
            ),
        }
    }
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl FrameTrace for NoTrace {
    fn on_frame(&mut self, _event: &FrameEvent<'_>) {}
}

/// One recorded trace event, owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub direction: Direction,
    pub channel: u16,
    /// `Debug` rendering of the body.
    pub body: Option<String>,
    pub payload_len: Option<usize>,
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingTrace {
    records: Vec<TraceRecord>,
}

impl RecordingTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }
}

impl FrameTrace for RecordingTrace {
    fn on_frame(&mut self, event: &FrameEvent<'_>) {
        self.records.push(TraceRecord {
            direction: event.direction,
            channel: event.channel,
            body: event.body.map(|body| format!("{body:?}")),
            payload_len: event.payload_len,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_trace_keeps_events() {
        let mut trace = RecordingTrace::new();
        let body = "open";
        trace.on_frame(&FrameEvent {
            direction: Direction::Incoming,
            channel: 3,
            body: Some(&body),
            payload_len: Some(4),
        });
        trace.on_frame(&FrameEvent {
            direction: Direction::Outgoing,
            channel: 0,
            body: None,
            payload_len: None,
        });

        assert_eq!(
            trace.records(),
            &[
                TraceRecord {
                    direction: Direction::Incoming,
                    channel: 3,
                    body: Some("\"open\"".to_string()),
                    payload_len: Some(4),
                },
                TraceRecord {
                    direction: Direction::Outgoing,
                    channel: 0,
                    body: None,
                    payload_len: None,
                },
            ]
        );
    }

    #[test]
    fn direction_labels() {
        assert_eq!(Direction::Incoming.to_string(), "IN");
        assert_eq!(Direction::Outgoing.to_string(), "OUT");
    }
}
