//! Drives one car from trigger to persisted verdict.
//!
//! ```text
//! Created -> GrayGate -> (Detecting) -> Classified -> Responded -> Persisted
//!    \__________\______________\____________\-> Errored
//! ```
//!
//! Measurement runs under the inspection timeout. Whatever happens inside it,
//! the car leaves with a terminal outcome and the line gets exactly one
//! verdict; failures and timeouts become the fail-safe reject.

mod capture;
mod stage;

pub use capture::{CaptureGuard, CapturePermit};
pub use stage::{InspectionStage, StageTrace};

use crate::classify::{Thresholds, classify, passes_gray_gate};
use crate::codec::{GalcReplyHeader, GalcStatus, plc};
use crate::collaborators::{Collaborators, Detection};
use crate::config::{ConfigState, InspectionConfig};
use crate::connection::LineLink;
use crate::error::pipeline::PipelineError;
use crate::events::{CarSummary, GatewayEvent, InspectionErrorMessage, Notifier};

use models::{ActualPart, Car, DetectedObject, EncodedImage, Outcome};

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Where the verdict goes once the car is classified.
#[derive(Debug, Clone)]
pub enum ResponseTarget {
    /// One verdict byte on the link that carried the trigger.
    Plc(LineLink),
    /// Already acknowledged; a stop frame follows a reject when enabled.
    Galc {
        link: LineLink,
        header: GalcReplyHeader,
    },
    /// Operator capture or a queued car whose link is gone.
    Detached,
}

/// Everything known about one finished inspection.
#[derive(Debug)]
pub struct InspectionReport {
    pub car: Car,
    pub trace: StageTrace,
    /// `true` once the line-facing response for this car was written.
    pub responded: bool,
    pub error: Option<String>,
    /// Detached defect report, when one was started.
    pub defect_report: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    collaborators: Collaborators,
    notifier: Arc<dyn Notifier>,
    config: ConfigState,
    capture: CaptureGuard,
}

struct Measurement {
    gray_percentage: Option<f32>,
    objects: Vec<DetectedObject>,
    original: EncodedImage,
    annotated: Option<EncodedImage>,
    actual: ActualPart,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, notifier: Arc<dyn Notifier>, config: ConfigState) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                collaborators,
                notifier,
                config,
                capture: CaptureGuard::new(),
            }),
        }
    }

    pub fn capture(&self) -> &CaptureGuard {
        &self.inner.capture
    }

    /// Inspects a line-triggered car. A busy camera ends the car in `Error`.
    pub async fn inspect(&self, car: Car, target: ResponseTarget) -> InspectionReport {
        self.run(car, target, None).await
    }

    /// Inspects with a capture permit the caller already holds.
    pub async fn inspect_with_permit(
        &self,
        car: Car,
        target: ResponseTarget,
        permit: CapturePermit,
    ) -> InspectionReport {
        self.run(car, target, Some(permit)).await
    }

    async fn run(&self, mut car: Car, target: ResponseTarget, permit: Option<CapturePermit>) -> InspectionReport {
        let config = self.inner.config.get().await;
        let limit = config.inspection.inspection_timeout();
        let mut trace = StageTrace::new();

        let measured = match timeout(limit, self.measure(&config.inspection, permit, &mut trace)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::timeout(limit)),
        };

        let error = match measured {
            Ok(measurement) => {
                car.gray_percentage = measurement.gray_percentage;
                car.detected_objects = measurement.objects;
                car.original_image = Some(measurement.original);
                car.result_image = measurement.annotated;
                car.actual_part = measurement.actual;
                car.outcome = Outcome::judge(car.expected_part, car.actual_part);
                info!(
                    "Car {}: expected {}, found {} => {:?}",
                    car.car_id,
                    car.expected_part.as_str(),
                    car.actual_part.as_str(),
                    car.outcome
                );
                None
            }
            Err(e) => {
                error!("Car {} failed inspection: {}", car.car_id, e);
                car.mark_error();
                trace.enter(InspectionStage::Errored);
                self.inner
                    .notifier
                    .emit(GatewayEvent::InspectionError(InspectionErrorMessage {
                        car_id: car.car_id.clone(),
                        message: e.to_string(),
                    }));
                Some(e.to_string())
            }
        };

        let responded = self
            .respond(&target, &car, config.protocol.galc_stop_on_reject)
            .await;
        if responded {
            trace.enter(InspectionStage::Responded);
        }

        match self.inner.collaborators.store.upsert(car.clone()).await {
            Ok(()) => trace.enter(InspectionStage::Persisted),
            Err(e) if e.is_conflict() => warn!("Discarding conflicting write for {}: {}", car.car_id, e),
            Err(e) => error!("Failed to persist {}: {}", car.car_id, e),
        }

        self.inner
            .notifier
            .emit(GatewayEvent::DetectionComplete(CarSummary::from(&car)));

        let defect_report = self.spawn_defect_report(&car);

        InspectionReport {
            car,
            trace,
            responded,
            error,
            defect_report,
        }
    }

    async fn measure(
        &self,
        inspection: &InspectionConfig,
        permit: Option<CapturePermit>,
        trace: &mut StageTrace,
    ) -> Result<Measurement, PipelineError> {
        let _permit = match permit {
            Some(permit) => permit,
            None => self.inner.capture.try_acquire()?,
        };

        trace.enter(InspectionStage::GrayGate);
        let image = self.inner.collaborators.image_source.acquire().await?;
        let thresholds = Thresholds::from(inspection);

        let gray_percentage = if inspection.gray_detection_enabled {
            Some(self.gray_percentage(image.clone()).await?)
        } else {
            None
        };

        let detection = match gray_percentage {
            Some(gray) if !passes_gray_gate(gray, &thresholds) => {
                info!("Gray {:.1}% below gate {:.1}%; skipping detection", gray, thresholds.gray_gate);
                None
            }
            _ => {
                trace.enter(InspectionStage::Detecting);
                Some(self.detect(image.clone(), inspection).await?)
            }
        };

        let (annotated, objects) = match detection {
            Some(detection) => (detection.annotated, detection.objects),
            None => (None, Vec::new()),
        };

        let actual = classify(gray_percentage, &objects, &thresholds);
        trace.enter(InspectionStage::Classified);

        Ok(Measurement {
            gray_percentage,
            objects,
            original: image,
            annotated,
            actual,
        })
    }

    async fn gray_percentage(&self, image: EncodedImage) -> Result<f32, PipelineError> {
        let gate = Arc::clone(&self.inner.collaborators.gray_gate);
        tokio::task::spawn_blocking(move || gate.percentage(&image))
            .await
            .map_err(|e| PipelineError::gray_gate(format!("Gray gate worker failed: {e}")))?
    }

    async fn detect(&self, image: EncodedImage, inspection: &InspectionConfig) -> Result<Detection, PipelineError> {
        let detector = Arc::clone(&self.inner.collaborators.detector);
        let labels = inspection.labels.clone();
        let min_confidence = inspection.min_conf_threshold;

        // Own task: a timeout abandons the result, never the call
        let handle = tokio::spawn(async move { detector.detect(image, &labels, min_confidence).await });
        handle
            .await
            .map_err(|e| PipelineError::detector(format!("Detector task failed: {e}")))?
    }

    async fn respond(&self, target: &ResponseTarget, car: &Car, stop_on_reject: bool) -> bool {
        let (link, bytes) = match target {
            ResponseTarget::Plc(link) => (link, vec![plc::encode_verdict(car.outcome)]),
            ResponseTarget::Galc { link, header } => {
                if car.outcome == Outcome::Good || !stop_on_reject {
                    debug!("GALC car {} needs no response beyond its ack", car.car_id);
                    return true;
                }
                (link, header.response(GalcStatus::Stop).to_vec())
            }
            ResponseTarget::Detached => return false,
        };

        match link.send(&bytes).await {
            Ok(()) => {
                info!("Sent {:?} verdict for {} on link #{}", car.outcome, car.car_id, link.id());
                true
            }
            Err(e) => {
                warn!("Dropping verdict for {}: {}", car.car_id, e);
                false
            }
        }
    }

    fn spawn_defect_report(&self, car: &Car) -> Option<JoinHandle<()>> {
        if car.outcome != Outcome::NoGood || car.actual_part == ActualPart::NoPart {
            return None;
        }

        let reporter = Arc::clone(&self.inner.collaborators.reporter);
        let car_id = car.car_id.clone();
        let body_number = car.body_number.clone();
        let image = car.result_image.clone().or_else(|| car.original_image.clone());
        let expected = car.expected_part;
        let actual = car.actual_part;

        Some(tokio::spawn(async move {
            let Some(body_number) = body_number else {
                warn!("Car {car_id} has no body number; defect not reported");
                return;
            };

            let vin = match reporter.lookup_vin(&body_number).await {
                Ok(Some(vin)) => vin,
                Ok(None) => {
                    warn!("No VIN for body {body_number}; defect for {car_id} not reported");
                    return;
                }
                Err(e) => {
                    error!("VIN lookup for {car_id} failed: {e}");
                    return;
                }
            };

            match reporter.report(&vin, image, expected, actual).await {
                Ok(true) => info!("Defect for {car_id} reported under VIN {vin}"),
                Ok(false) => warn!("Plant system declined defect for {car_id}"),
                Err(e) => error!("Defect report for {car_id} failed: {e}"),
            }
        }))
    }
}
