//! The inspection job and its deferred GALC counterpart.

use crate::connection::Protocol;
use crate::detection::{DetectedObject, EncodedImage};
use crate::error::model_error::ModelError;
use crate::part::{ActualPart, ExpectedPart, Outcome};
use crate::ErrorLocation;

use std::panic::Location;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inspection job. `car_id` never changes once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub car_id: String,
    pub source: Protocol,
    pub expected_part: ExpectedPart,
    pub actual_part: ActualPart,
    pub outcome: Outcome,
    pub gray_percentage: Option<f32>,
    pub detected_objects: Vec<DetectedObject>,
    pub body_number: Option<String>,
    #[serde(skip)]
    pub original_image: Option<EncodedImage>,
    #[serde(skip)]
    pub result_image: Option<EncodedImage>,
    pub created_at: DateTime<Utc>,
}

impl Car {
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }

    /// Forces the car into the error verdict, keeping whatever was already measured.
    pub fn mark_error(&mut self) {
        self.actual_part = ActualPart::Error;
        self.outcome = Outcome::Error;
    }

    /// Same final verdict and measurements, ignoring image handles.
    pub fn same_verdict(&self, other: &Car) -> bool {
        self.car_id == other.car_id
            && self.actual_part == other.actual_part
            && self.outcome == other.outcome
            && self.gray_percentage == other.gray_percentage
            && self.detected_objects == other.detected_objects
    }
}

/// A GALC trigger waiting for an explicit "process" call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCar {
    pub car_id: String,
    pub source: Protocol,
    pub expected_part: ExpectedPart,
    pub body_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_processed: bool,
}

impl QueuedCar {
    pub fn to_car(&self) -> Car {
        Car {
            car_id: self.car_id.clone(),
            source: self.source,
            expected_part: self.expected_part,
            actual_part: ActualPart::Pending,
            outcome: Outcome::Pending,
            gray_percentage: None,
            detected_objects: Vec::new(),
            body_number: self.body_number.clone(),
            original_image: None,
            result_image: None,
            created_at: self.created_at,
        }
    }
}

/// Builder for validated [`Car`] and [`QueuedCar`] instances.
///
/// New jobs always start `Pending`; verdict fields are owned by the pipeline.
#[derive(Debug, Default)]
pub struct CarBuilder {
    car_id: Option<String>,
    source: Option<Protocol>,
    expected_part: Option<ExpectedPart>,
    body_number: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl CarBuilder {
    pub fn with_car_id(mut self, car_id: impl Into<String>) -> Self {
        self.car_id = Some(car_id.into());
        self
    }

    pub fn with_source(mut self, source: Protocol) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_expected_part(mut self, expected: ExpectedPart) -> Self {
        self.expected_part = Some(expected);
        self
    }

    pub fn with_body_number(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        let trimmed = body.trim();
        self.body_number = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[track_caller]
    pub fn build(self) -> Result<Car, ModelError> {
        let (car_id, source, expected_part) = self.required()?;

        Ok(Car {
            car_id,
            source,
            expected_part,
            actual_part: ActualPart::Pending,
            outcome: Outcome::Pending,
            gray_percentage: None,
            detected_objects: Vec::new(),
            body_number: self.body_number,
            original_image: None,
            result_image: None,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }

    #[track_caller]
    pub fn build_queued(self) -> Result<QueuedCar, ModelError> {
        let (car_id, source, expected_part) = self.required()?;

        Ok(QueuedCar {
            car_id,
            source,
            expected_part,
            body_number: self.body_number,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            is_processed: false,
        })
    }

    #[track_caller]
    fn required(&self) -> Result<(String, Protocol, ExpectedPart), ModelError> {
        let car_id = self.car_id.clone().ok_or_else(|| ModelError::Validation {
            message: String::from("Car ID is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if car_id.trim().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Car ID cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let source = self.source.ok_or_else(|| ModelError::Validation {
            message: String::from("Source protocol is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let expected_part = self.expected_part.ok_or_else(|| ModelError::Validation {
            message: String::from("Expected part is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok((car_id, source, expected_part))
    }
}
