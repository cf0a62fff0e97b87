use std::fmt;
use std::io;

use amqwire_frame::{EncodeError, FrameError, ReadError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const NOT_FOUND: i32 = 2;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    if err.is_terminal() {
        CliError::new(DATA_INVALID, format!("{context}: {err}"))
    } else {
        CliError::new(INTERNAL, format!("{context}: {err}"))
    }
}

pub fn read_error(context: &str, err: ReadError) -> CliError {
    match err {
        ReadError::Io(source) => io_error(context, source),
        ReadError::Frame(err) => frame_error(context, err),
        ReadError::ConnectionClosed => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

pub fn encode_error(context: &str, err: EncodeError) -> CliError {
    match err {
        EncodeError::Io(source) => io_error(context, source),
        EncodeError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        EncodeError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(USAGE, format!("{context}: {other}")),
    }
}
