//! Resumable AMQP 1.0 frame parsing.
//!
//! amqwire splits a byte stream into AMQP frames without ever requiring a
//! whole frame to be in memory at once: input arrives in arbitrary chunks,
//! frames are handed to a consumer that may apply backpressure, and any
//! framing error permanently fails the connection.
//!
//! # Crate Structure
//!
//! - [`frame`]: protocol header check, frame parser, codec, and I/O pumps
//!
//! The `amqwire` binary (behind the `cli` feature) decodes captured streams
//! and encodes frames for testing.

/// Re-export frame types.
pub mod frame {
    pub use amqwire_frame::*;
}
