use crate::error::PipelineError;
use crate::orchestrator::CaptureGuard;

/// **VALUE**: Verifies a second capture is refused while the first holds the camera.
///
/// **WHY THIS MATTERS**: Two captures on one camera interleave frames; the verdict
/// could be computed on the wrong car.
///
/// **BUG THIS CATCHES**: Would catch a guard that queues or silently succeeds.
#[test]
fn given_capture_in_progress_when_second_acquired_then_busy() {
    // GIVEN: One permit held
    let guard = CaptureGuard::new();
    let permit = guard.try_acquire().expect("first capture");

    // WHEN: Another caller tries
    let second = guard.clone().try_acquire();

    // THEN: Busy, and free again once the first finishes
    assert!(matches!(second, Err(PipelineError::Busy { .. })));
    assert!(guard.is_busy());
    drop(permit);
    assert!(!guard.is_busy());
    assert!(guard.try_acquire().is_ok());
}
