use crate::collaborators::{
    FileImageSource, LoggingDefectReporter, UnavailableDetector, standalone,
};
use crate::paths::GatewayPaths;

use inspection_core::collaborators::{DefectReporter, Detector, ImageSource};
use inspection_core::error::PipelineError;
use models::{ActualPart, EncodedImage, ExpectedPart};

use std::fs;
use std::path::PathBuf;

#[tokio::test]
async fn given_image_file_when_acquired_then_bytes_returned() {
    // GIVEN: A file on disk
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.jpg");
    fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

    // WHEN: Acquiring
    let image = FileImageSource::new(Some(path)).acquire().await.unwrap();

    // THEN: Same bytes come back
    assert_eq!(image.as_bytes(), &[0xFF, 0xD8, 0xFF, 0xE0]);
}

/// **VALUE**: A missing camera yields an image-source error, not a panic.
///
/// **WHY THIS MATTERS**: The orchestrator turns this error into a fail-safe
/// reject; a panic would kill the inspection task and leave the PLC waiting.
///
/// **BUG THIS CATCHES**: Would catch an `unwrap()` on the configured path.
#[tokio::test]
async fn given_missing_image_file_when_acquired_then_image_source_error() {
    // GIVEN: A path that does not exist
    let source = FileImageSource::new(Some(PathBuf::from("/nonexistent/frame.png")));

    // WHEN: Acquiring
    let result = source.acquire().await;

    // THEN: ImageSource error
    assert!(matches!(result, Err(PipelineError::ImageSource { .. })));
}

#[tokio::test]
async fn given_no_image_configured_when_acquired_then_error() {
    let result = FileImageSource::new(None).acquire().await;

    assert!(matches!(result, Err(PipelineError::ImageSource { .. })));
}

#[tokio::test]
async fn given_empty_image_file_when_acquired_then_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.png");
    fs::write(&path, b"").unwrap();

    let result = FileImageSource::new(Some(path)).acquire().await;

    assert!(matches!(result, Err(PipelineError::ImageSource { .. })));
}

#[tokio::test]
async fn given_unavailable_detector_when_called_then_detector_error() {
    let result = UnavailableDetector
        .detect(EncodedImage::from(vec![1, 2, 3]), &[], 0.5)
        .await;

    assert!(matches!(result, Err(PipelineError::Detector { .. })));
}

#[tokio::test]
async fn given_logging_reporter_when_used_then_lookup_and_report_succeed() {
    let reporter = LoggingDefectReporter;

    let vin = reporter.lookup_vin(" A123 ").await.unwrap();
    assert_eq!(vin.as_deref(), Some("BODY-A123"));

    let accepted = reporter
        .report("BODY-A123", None, ExpectedPart::Tipo1, ActualPart::Tipo3)
        .await
        .unwrap();
    assert!(accepted);
}

#[tokio::test]
async fn given_blank_body_when_vin_looked_up_then_error() {
    assert!(LoggingDefectReporter.lookup_vin("   ").await.is_err());
}

#[tokio::test]
async fn given_standalone_wiring_when_built_then_camera_uses_configured_path() {
    // GIVEN: Paths with an image
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    fs::write(&path, [7u8; 16]).unwrap();
    let paths = GatewayPaths {
        config_dir: dir.path().to_path_buf(),
        log_dir: dir.path().to_path_buf(),
        image_path: Some(path),
    };

    // WHEN: Building the collaborators
    let collaborators = standalone(&paths);

    // THEN: The camera serves the file and the detector is unavailable
    let image = collaborators.image_source.acquire().await.unwrap();
    assert_eq!(image.len(), 16);
    let detection = collaborators
        .detector
        .detect(image, &[], 0.5)
        .await;
    assert!(detection.is_err());
}
