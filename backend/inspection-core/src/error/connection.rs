use common::ErrorLocation;
use models::Protocol;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ConnectionError {
    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("Retries Exhausted Error: {host}:{port} unreachable after {attempts} attempts {location}")]
    RetriesExhausted {
        host: String,
        port: u16,
        attempts: u32,
        location: ErrorLocation,
    },

    #[error("Mode Locked Error: cannot switch to {requested} while {active} is not disconnected {location}")]
    ModeLocked {
        active: Protocol,
        requested: Protocol,
        location: ErrorLocation,
    },

    #[error("Link Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Write Timeout Error: {message} {location}")]
    WriteTimeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl ConnectionError {
    #[track_caller]
    pub fn closed(message: impl Into<String>) -> Self {
        ConnectionError::Closed {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IoError> for ConnectionError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        ConnectionError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
