//! Generic `Motors` trait for the tracked chassis.

use tankbot_types::TankError;

/// Two-track drive base commanded in arcade form.
///
/// `x` is the turn component and `y` the throttle, both in `[-1, 1]`.  The
/// driver mixes them into track speeds (`left = y + x`, `right = y - x`).
pub trait Motors: Send {
    /// Stable identifier, e.g. `"tracks"`.
    fn id(&self) -> &str;

    /// Apply an arcade-drive request.
    ///
    /// # Errors
    ///
    /// Returns [`TankError::HardwareFault`] if the controller rejects the
    /// command.
    fn move_arcade(&mut self, x: f32, y: f32) -> Result<(), TankError>;

    /// Bring both tracks to rest.
    fn stop(&mut self) -> Result<(), TankError>;
}
