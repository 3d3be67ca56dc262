//! Generic `Leds` trait for the addressable status strip.

use tankbot_types::{LedMode, Rgb, TankError};

/// Colour shown while no behavior is running.
pub const PASSIVE_COLOR: Rgb = Rgb::new(40, 40, 40);

/// Addressable LED strip driven by named animation modes.
pub trait Leds: Send {
    /// Switch the strip to `mode`, using `color` where the mode takes one.
    ///
    /// # Errors
    ///
    /// Returns [`TankError::HardwareFault`] if the strip cannot be written.
    fn set_mode(&mut self, mode: LedMode, color: Rgb) -> Result<(), TankError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockLeds {
        current: Option<(LedMode, Rgb)>,
    }

    impl Leds for MockLeds {
        fn set_mode(&mut self, mode: LedMode, color: Rgb) -> Result<(), TankError> {
            self.current = Some((mode, color));
            Ok(())
        }
    }

    #[test]
    fn mock_leds_record_mode() {
        let mut leds = MockLeds { current: None };
        leds.set_mode(LedMode::Static, PASSIVE_COLOR).unwrap();
        assert_eq!(leds.current, Some((LedMode::Static, PASSIVE_COLOR)));
    }
}
