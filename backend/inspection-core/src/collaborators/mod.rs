//! Seams to the outside world: camera, gray analysis, object detector,
//! persistence and the plant defect system.
//!
//! Production wiring and tests supply their own implementations.

use crate::error::pipeline::PipelineError;
use crate::error::reporting::ReportingError;
use crate::error::store::StoreError;

use models::{ActualPart, Car, DetectedObject, EncodedImage, ExpectedPart, FeedbackEntry, QueuedCar};

use std::sync::Arc;

use async_trait::async_trait;

/// Produces one still image of the car under inspection.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn acquire(&self) -> Result<EncodedImage, PipelineError>;
}

/// Share of "capot gray" pixels in an image, as a percentage in `[0, 100]`.
///
/// CPU bound; called from a blocking worker.
pub trait GrayGate: Send + Sync {
    fn percentage(&self, image: &EncodedImage) -> Result<f32, PipelineError>;
}

/// Output of one detector run.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Input image with boxes drawn, when the detector renders one.
    pub annotated: Option<EncodedImage>,
    pub objects: Vec<DetectedObject>,
}

/// Object detector over the configured label set.
///
/// Objects scoring below `min_confidence` may be returned; the classifier
/// filters them again.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(
        &self,
        image: EncodedImage,
        labels: &[String],
        min_confidence: f32,
    ) -> Result<Detection, PipelineError>;
}

/// Persistence for cars, the GALC queue and operator feedback.
///
/// Every write is keyed by `car_id` and must be idempotent.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a new car; [`StoreError::Conflict`] if `car_id` already exists.
    async fn create(&self, car: Car) -> Result<(), StoreError>;

    /// Inserts or replaces a car. Replacing a terminal car with a different
    /// verdict is a [`StoreError::Conflict`]; re-writing the same verdict is not.
    async fn upsert(&self, car: Car) -> Result<(), StoreError>;

    async fn find(&self, car_id: &str) -> Result<Option<Car>, StoreError>;

    /// Inserts a queued car; an existing entry for the same `car_id` is a conflict.
    async fn upsert_queued(&self, queued: QueuedCar) -> Result<(), StoreError>;

    async fn find_queued(&self, car_id: &str) -> Result<Option<QueuedCar>, StoreError>;

    /// Unprocessed queue entries, oldest first.
    async fn pending_queue(&self) -> Result<Vec<QueuedCar>, StoreError>;

    async fn mark_processed(&self, car_id: &str) -> Result<(), StoreError>;

    async fn append_feedback(&self, entry: FeedbackEntry) -> Result<(), StoreError>;
}

/// Plant defect-reporting system (VIN lookup and defect post).
#[async_trait]
pub trait DefectReporter: Send + Sync {
    async fn lookup_vin(&self, body_number: &str) -> Result<Option<String>, ReportingError>;

    /// Returns whether the plant system accepted the report.
    async fn report(
        &self,
        vin: &str,
        image: Option<EncodedImage>,
        expected: ExpectedPart,
        actual: ActualPart,
    ) -> Result<bool, ReportingError>;
}

/// The concrete collaborators one gateway instance runs with.
#[derive(Clone)]
pub struct Collaborators {
    pub image_source: Arc<dyn ImageSource>,
    pub gray_gate: Arc<dyn GrayGate>,
    pub detector: Arc<dyn Detector>,
    pub store: Arc<dyn Store>,
    pub reporter: Arc<dyn DefectReporter>,
}
