use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Defect reporting failures. Logged only; never change a verdict already sent.
#[derive(Debug, ThisError)]
pub enum ReportingError {
    #[error("VIN Lookup Error: {message} {location}")]
    VinLookup {
        message: String,
        location: ErrorLocation,
    },

    #[error("Defect Report Error: {message} {location}")]
    Report {
        message: String,
        location: ErrorLocation,
    },
}

impl ReportingError {
    #[track_caller]
    pub fn vin_lookup(message: impl Into<String>) -> Self {
        ReportingError::VinLookup {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn report(message: impl Into<String>) -> Self {
        ReportingError::Report {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
