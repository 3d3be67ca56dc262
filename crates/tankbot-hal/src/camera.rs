//! Generic `Camera` trait and supporting types for the robot's two cameras.

use tankbot_types::{CameraId, TankError};

/// A raw image frame returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel data (RGB24).
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// A black RGB24 frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width * height * 3) as usize],
        }
    }
}

/// Front and rear cameras.  Capture runs on the driver's own thread; callers
/// only ever pick up the most recent frame.
pub trait Camera: Send {
    /// Most recent frame from `which`, or `None` when that camera has not
    /// produced one yet.
    fn latest_frame(&mut self, which: CameraId) -> Option<CameraFrame>;

    /// Apply digital zoom `factor` (1 = none) to `which`.
    ///
    /// # Errors
    ///
    /// Returns [`TankError::HardwareFault`] if the camera rejects the setting.
    fn set_zoom(&mut self, which: CameraId, factor: f32) -> Result<(), TankError>;
}
