//! Malformed wire data. A frame error skips the frame; the connection stays open.

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum FrameError {
    #[error("Frame Length Error: expected {expected} bytes, got {actual} {location}")]
    Length {
        expected: usize,
        actual: usize,
        location: ErrorLocation,
    },

    #[error("Frame Truncated Error: need at least {minimum} chars, got {actual} {location}")]
    Truncated {
        minimum: usize,
        actual: usize,
        location: ErrorLocation,
    },

    #[error("Unknown Capot Code Error: {code:?} {location}")]
    UnknownCode {
        code: String,
        location: ErrorLocation,
    },

    #[error("Malformed Frame Error: {message} {location}")]
    Malformed {
        message: String,
        location: ErrorLocation,
    },
}

impl FrameError {
    #[track_caller]
    pub fn length(expected: usize, actual: usize) -> Self {
        FrameError::Length {
            expected,
            actual,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn truncated(minimum: usize, actual: usize) -> Self {
        FrameError::Truncated {
            minimum,
            actual,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unknown_code(code: impl Into<String>) -> Self {
        FrameError::UnknownCode {
            code: code.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn malformed(message: impl Into<String>) -> Self {
        FrameError::Malformed {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
