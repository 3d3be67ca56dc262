//! Generic `Servos` trait for the arm and camera-pan servos.

use tankbot_types::{ServoId, TankError};

/// Mechanical travel of every servo on the robot, in degrees.
pub const SERVO_RANGE: (f32, f32) = (0.0, 180.0);

/// Clamp `angle` into [`SERVO_RANGE`].
pub fn clamp_angle(angle: f32) -> f32 {
    angle.clamp(SERVO_RANGE.0, SERVO_RANGE.1)
}

/// Bank of hobby servos addressed by [`ServoId`].
pub trait Servos: Send {
    /// Move `servo` to `angle_deg`.
    ///
    /// # Errors
    ///
    /// Returns [`TankError::HardwareFault`] when the PWM controller cannot be
    /// written.
    fn set_angle(&mut self, servo: ServoId, angle_deg: f32) -> Result<(), TankError>;

    /// Last commanded angle, if the servo has been driven since start-up.
    fn angle(&self, servo: ServoId) -> Option<f32>;
}
