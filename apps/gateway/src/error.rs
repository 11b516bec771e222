use common::ErrorLocation;
use inspection_core::error::{ConfigError, ConnectionError, CoreError};

use std::io::Error as IoError;
use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors that stop the gateway process.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayAppError {
    /// Startup or shutdown failure in this binary
    #[error("Gateway Error: {message} {location}")]
    Gateway {
        message: String,
        location: ErrorLocation,
    },

    /// Error from inspection-core
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl GatewayAppError {
    #[track_caller]
    pub fn gateway(message: impl Into<String>) -> Self {
        GatewayAppError::Gateway {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<CoreError> for GatewayAppError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        GatewayAppError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for GatewayAppError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        GatewayAppError::from(CoreError::from(error))
    }
}

impl From<ConnectionError> for GatewayAppError {
    #[track_caller]
    fn from(error: ConnectionError) -> Self {
        GatewayAppError::from(CoreError::from(error))
    }
}

impl From<IoError> for GatewayAppError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        GatewayAppError::Gateway {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
