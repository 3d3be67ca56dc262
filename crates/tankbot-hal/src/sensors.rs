//! Ranging, floor and battery sensor traits.

use tankbot_types::TankError;

/// One ultrasonic sample pair, in centimetres.  `None` means the echo timed
/// out or the reading was implausible.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Distances {
    pub front: Option<f32>,
    pub rear: Option<f32>,
}

/// Front and rear ultrasonic rangefinders.
pub trait Ultrasonic: Send {
    /// Sample both rangefinders.
    ///
    /// # Errors
    ///
    /// Returns [`TankError::HardwareFault`] when the GPIO bus cannot be read.
    fn get_distances(&mut self) -> Result<Distances, TankError>;
}

/// Three downward-facing infrared sensors (left, center, right).
///
/// `true` means the channel sees no reflective floor: an edge, or the dark
/// line when line tracking.
pub trait Infrared: Send {
    fn get_values(&mut self) -> Result<[bool; 3], TankError>;
}

/// Battery gauge.
pub trait Battery: Send {
    /// Remaining charge in percent.
    fn percent(&mut self) -> Result<f32, TankError>;
}
