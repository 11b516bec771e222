//! Failures inside an inspection. Any of these ends the car in `Error`
//! and the line receives the fail-safe reject.

use common::ErrorLocation;
use models::ModelError;

use std::panic::Location;
use std::time::Duration;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PipelineError {
    #[error("Image Source Error: {message} {location}")]
    ImageSource {
        message: String,
        location: ErrorLocation,
    },

    #[error("Gray Gate Error: {message} {location}")]
    GrayGate {
        message: String,
        location: ErrorLocation,
    },

    #[error("Detector Error: {message} {location}")]
    Detector {
        message: String,
        location: ErrorLocation,
    },

    #[error("Capture Busy Error: a capture is already in progress {location}")]
    Busy { location: ErrorLocation },

    #[error("Inspection Timeout Error: no verdict within {timeout:?} {location}")]
    Timeout {
        timeout: Duration,
        location: ErrorLocation,
    },

    #[error("Queue Error: {message} {location}")]
    Queue {
        message: String,
        location: ErrorLocation,
    },

    #[error("Model Error: {message} {location}")]
    Model {
        message: String,
        location: ErrorLocation,
    },
}

impl PipelineError {
    #[track_caller]
    pub fn image_source(message: impl Into<String>) -> Self {
        PipelineError::ImageSource {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn gray_gate(message: impl Into<String>) -> Self {
        PipelineError::GrayGate {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn detector(message: impl Into<String>) -> Self {
        PipelineError::Detector {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn busy() -> Self {
        PipelineError::Busy {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn timeout(timeout: Duration) -> Self {
        PipelineError::Timeout {
            timeout,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn queue(message: impl Into<String>) -> Self {
        PipelineError::Queue {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ModelError> for PipelineError {
    #[track_caller]
    fn from(error: ModelError) -> Self {
        PipelineError::Model {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
