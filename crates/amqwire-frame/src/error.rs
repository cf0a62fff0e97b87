/// Failure reported by a [`BodyDecoder`](crate::body::BodyDecoder).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    /// Create a decode error with a diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The underlying diagnostic.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors that can occur while parsing the inbound frame stream.
///
/// Every variant except [`FrameError::InputBufferFull`] is terminal: once
/// returned, the parser stays broken for the life of the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A protocol header byte did not match.
    #[error("protocol header mismatch at byte {position}: got {actual:#04x}, expected {expected:#04x}")]
    HeaderMismatch {
        position: usize,
        expected: u8,
        actual: u8,
    },

    /// The declared frame size is below the minimum frame size.
    #[error("frame size {size} smaller than minimum frame size {min}")]
    FrameTooSmall { size: u32, min: u32 },

    /// The declared frame size exceeds the configured maximum.
    #[error("frame size {size} larger than maximum frame size {max}")]
    FrameTooLarge { size: u32, max: usize },

    /// The data offset points inside the fixed frame header.
    #[error("frame data offset {offset} smaller than minimum frame header size {min}")]
    DataOffsetTooSmall { offset: usize, min: usize },

    /// The data offset points past the end of the frame.
    #[error("frame data offset {offset} larger than the frame size {size}")]
    DataOffsetTooLarge { offset: usize, size: u32 },

    /// The frame type byte is not the AMQP frame type.
    #[error("unknown frame type: {0}")]
    UnknownFrameType(u8),

    /// The body decoder rejected the frame body.
    #[error("frame body decode failed: {0}")]
    BodyDecode(#[source] DecodeError),

    /// The body decoder produced something other than a frame body.
    #[error("frame body decoded to {kind}, which is not a frame body")]
    UnexpectedBody { kind: String },

    /// The parser already failed on an earlier call.
    #[error("unable to parse, probably because of a previous error")]
    PreviouslyFailed,

    /// The input buffer is full while a frame waits for the consumer.
    ///
    /// Not terminal: retry the remaining bytes once the consumer drains.
    #[error("input buffer full ({accepted} bytes accepted)")]
    InputBufferFull { accepted: usize },
}

impl FrameError {
    /// Returns true if this error leaves the parser permanently broken.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FrameError::InputBufferFull { .. })
    }
}

/// Errors from pumping a byte source into a parser.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// An I/O error occurred while reading.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The parser rejected the stream.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The stream ended in the middle of a frame.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

/// Errors that can occur while encoding or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The extended header does not fit in the one-byte data offset.
    #[error("extended header too large ({len} bytes, max {max})")]
    ExtendedHeaderTooLarge { len: usize, max: usize },

    /// The encoded frame does not fit in the 32-bit size field.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The frame body could not be serialized.
    #[error("frame body encode failed: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The writer returned zero bytes written.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
