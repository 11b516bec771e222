//! Collaborators the standalone binary runs with.
//!
//! Camera and detector are site integrations; without them the gateway still
//! connects, sequences cars and fail-safe rejects every inspection.

use crate::paths::GatewayPaths;

use inspection_core::collaborators::{
    Collaborators, DefectReporter, Detection, Detector, ImageSource,
};
use inspection_core::error::{PipelineError, ReportingError};
use inspection_core::gray::HsvGrayGate;
use inspection_core::store::MemoryStore;
use models::{ActualPart, EncodedImage, ExpectedPart};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

/// Serves the same still image from disk on every acquisition.
#[derive(Debug, Clone)]
pub struct FileImageSource {
    path: Option<PathBuf>,
}

impl FileImageSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ImageSource for FileImageSource {
    async fn acquire(&self) -> Result<EncodedImage, PipelineError> {
        let Some(path) = &self.path else {
            return Err(PipelineError::image_source("no camera image configured"));
        };

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PipelineError::image_source(format!("failed to read {}: {e}", path.display()))
        })?;

        if bytes.is_empty() {
            return Err(PipelineError::image_source(format!(
                "{} is empty",
                path.display()
            )));
        }

        Ok(EncodedImage::from(bytes))
    }
}

/// Stands in when no detector service is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDetector;

#[async_trait]
impl Detector for UnavailableDetector {
    async fn detect(
        &self,
        _image: EncodedImage,
        _labels: &[String],
        _min_confidence: f32,
    ) -> Result<Detection, PipelineError> {
        Err(PipelineError::detector("no detector configured"))
    }
}

/// Writes defect reports to the log instead of the plant system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDefectReporter;

#[async_trait]
impl DefectReporter for LoggingDefectReporter {
    async fn lookup_vin(&self, body_number: &str) -> Result<Option<String>, ReportingError> {
        if body_number.trim().is_empty() {
            return Err(ReportingError::vin_lookup("empty body number"));
        }
        Ok(Some(format!("BODY-{}", body_number.trim())))
    }

    async fn report(
        &self,
        vin: &str,
        image: Option<EncodedImage>,
        expected: ExpectedPart,
        actual: ActualPart,
    ) -> Result<bool, ReportingError> {
        let image_bytes = image.as_ref().map_or(0, EncodedImage::len);
        warn!(
            "Defect for {vin}: expected {expected:?}, found {actual:?} ({image_bytes} image bytes)"
        );
        Ok(true)
    }
}

/// Builds the default collaborator set from resolved paths.
pub fn standalone(paths: &GatewayPaths) -> Collaborators {
    match &paths.image_path {
        Some(path) => info!("Camera images served from {}", path.display()),
        None => warn!("No camera image configured; inspections will fail safe"),
    }

    Collaborators {
        image_source: Arc::new(FileImageSource::new(paths.image_path.clone())),
        gray_gate: Arc::new(HsvGrayGate::default()),
        detector: Arc::new(UnavailableDetector),
        store: Arc::new(MemoryStore::new()),
        reporter: Arc::new(LoggingDefectReporter),
    }
}
