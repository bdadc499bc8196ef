//! Error types for the meshd-core crate.

use core::fmt;

/// Errors raised while decoding a routing frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    TooShort { min: usize, actual: usize },
    TrailingBytes { expected: usize, actual: usize },
    InvalidVersion(u8),
    InvalidFrameType(u8),
    TtlOutOfRange(u8),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooShort { min, actual } => {
                write!(f, "frame too short: need at least {min} bytes, got {actual}")
            }
            FrameError::TrailingBytes { expected, actual } => {
                write!(
                    f,
                    "frame has trailing bytes: expected {expected} bytes, got {actual}"
                )
            }
            FrameError::InvalidVersion(v) => write!(f, "invalid frame version: {v}"),
            FrameError::InvalidFrameType(v) => write!(f, "invalid frame type: {v}"),
            FrameError::TtlOutOfRange(v) => write!(f, "frame TTL out of range: {v}"),
        }
    }
}

impl std::error::Error for FrameError {}
