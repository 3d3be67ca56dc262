//! Asynchronous object detection over camera frames.

use async_trait::async_trait;
use tankbot_types::{Detection, TankError};

use crate::camera::CameraFrame;

/// Object detector.  Inference may take longer than a behavior tick, so the
/// call is async and must not hold any hardware lock.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run detection on `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`TankError::HardwareFault`] if the inference backend fails.
    async fn detect(&self, frame: &CameraFrame) -> Result<Vec<Detection>, TankError>;
}
