//! Stand-in drivers used when a collaborator is unavailable at start-up.
//!
//! | Driver | Behaviour |
//! |---|---|
//! | [`NoopMotors`], [`NoopServos`], [`NoopLeds`] | Accept every command and do nothing. |
//! | [`NoopUltrasonic`] | Always reports both distances unknown. |
//! | [`NoopInfrared`] | Always reports all channels clear. |
//! | [`NoopCamera`] | Never has a frame. |
//! | [`NoopDetector`] | Never detects anything. |
//! | [`NoopBattery`] | Fails every read so the last known level is kept. |

use async_trait::async_trait;
use tankbot_types::{CameraId, Detection, LedMode, Rgb, ServoId, TankError};

use crate::camera::{Camera, CameraFrame};
use crate::detector::Detector;
use crate::leds::Leds;
use crate::motors::Motors;
use crate::sensors::{Battery, Distances, Infrared, Ultrasonic};
use crate::servos::Servos;

pub struct NoopMotors;

impl Motors for NoopMotors {
    fn id(&self) -> &str {
        "noop"
    }

    fn move_arcade(&mut self, _x: f32, _y: f32) -> Result<(), TankError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TankError> {
        Ok(())
    }
}

pub struct NoopServos;

impl Servos for NoopServos {
    fn set_angle(&mut self, _servo: ServoId, _angle_deg: f32) -> Result<(), TankError> {
        Ok(())
    }

    fn angle(&self, _servo: ServoId) -> Option<f32> {
        None
    }
}

pub struct NoopUltrasonic;

impl Ultrasonic for NoopUltrasonic {
    fn get_distances(&mut self) -> Result<Distances, TankError> {
        Ok(Distances::default())
    }
}

pub struct NoopInfrared;

impl Infrared for NoopInfrared {
    fn get_values(&mut self) -> Result<[bool; 3], TankError> {
        Ok([false; 3])
    }
}

pub struct NoopLeds;

impl Leds for NoopLeds {
    fn set_mode(&mut self, _mode: LedMode, _color: Rgb) -> Result<(), TankError> {
        Ok(())
    }
}

pub struct NoopCamera;

impl Camera for NoopCamera {
    fn latest_frame(&mut self, _which: CameraId) -> Option<CameraFrame> {
        None
    }

    fn set_zoom(&mut self, _which: CameraId, _factor: f32) -> Result<(), TankError> {
        Ok(())
    }
}

pub struct NoopDetector;

#[async_trait]
impl Detector for NoopDetector {
    async fn detect(&self, _frame: &CameraFrame) -> Result<Vec<Detection>, TankError> {
        Ok(Vec::new())
    }
}

pub struct NoopBattery;

impl Battery for NoopBattery {
    fn percent(&mut self) -> Result<f32, TankError> {
        Err(TankError::HardwareUnavailable("battery".into()))
    }
}
