use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StoreError {
    /// A write would create a second record for `car_id` or overwrite a final verdict.
    #[error("Conflict Error: {car_id}: {message} {location}")]
    Conflict {
        car_id: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Found Error: {car_id} {location}")]
    NotFound {
        car_id: String,
        location: ErrorLocation,
    },

    #[error("Store Backend Error: {message} {location}")]
    Backend {
        message: String,
        location: ErrorLocation,
    },
}

impl StoreError {
    #[track_caller]
    pub fn conflict(car_id: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Conflict {
            car_id: car_id.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_found(car_id: impl Into<String>) -> Self {
        StoreError::NotFound {
            car_id: car_id.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
