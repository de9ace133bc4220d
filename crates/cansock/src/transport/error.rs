//! Transport layer errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Partial frame written: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Transport not supported: {0}")]
    Unsupported(String),

    #[error("Transport handle closed")]
    Closed,
}

impl TransportError {
    /// The OS error number, if this error came from a failed syscall
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            TransportError::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}
