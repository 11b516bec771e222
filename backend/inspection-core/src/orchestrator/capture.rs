use crate::error::pipeline::PipelineError;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Single "capture in progress" flag shared by every inspection entry point.
#[derive(Debug, Clone, Default)]
pub struct CaptureGuard {
    busy: Arc<AtomicBool>,
}

impl CaptureGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the camera, or fails with [`PipelineError::Busy`] without waiting.
    #[track_caller]
    pub fn try_acquire(&self) -> Result<CapturePermit, PipelineError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::busy())?;
        Ok(CapturePermit {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the capture flag on drop.
#[derive(Debug)]
pub struct CapturePermit {
    busy: Arc<AtomicBool>,
}

impl Drop for CapturePermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
