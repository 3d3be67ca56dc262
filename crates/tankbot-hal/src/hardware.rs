//! [`Hardware`] – the bundle of collaborator drivers the core talks to.
//!
//! Every driver sits behind its own [`Mutex`] so that the sensor loop, the
//! dispatcher and a running behavior can share one `Arc<Hardware>` while
//! each device sees strictly serialized calls.  Locks are held only for the
//! duration of a single driver call and never across an `.await`.
//!
//! # Degraded start-up
//!
//! [`HardwareBuilder`] accepts either a driver or the error that prevented
//! its construction.  Missing drivers are replaced by the stand-ins in
//! [`noop`][crate::noop] and the substitution is logged, so the robot still
//! starts with whatever hardware is present.
//!
//! ```rust
//! use tankbot_hal::{Hardware, sim::SimMotors};
//! use tankbot_types::TankError;
//!
//! let hw = Hardware::builder()
//!     .with_motors(SimMotors::new())
//!     .try_infrared(Err(TankError::HardwareUnavailable("gpio busy".into())))
//!     .build();
//!
//! assert!(hw.fallbacks().contains(&"infrared"));
//! assert_eq!(hw.read_infrared().unwrap(), [false; 3]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use tankbot_types::{CameraId, Detection, LedMode, Rgb, ServoId, TankError};
use tracing::warn;

use crate::camera::{Camera, CameraFrame};
use crate::detector::Detector;
use crate::leds::Leds;
use crate::motors::Motors;
use crate::noop::{
    NoopBattery, NoopCamera, NoopDetector, NoopInfrared, NoopLeds, NoopMotors, NoopServos,
    NoopUltrasonic,
};
use crate::sensors::{Battery, Distances, Infrared, Ultrasonic};
use crate::servos::{Servos, clamp_angle};

// ─────────────────────────────────────────────────────────────────────────────
// Hardware
// ─────────────────────────────────────────────────────────────────────────────

pub struct Hardware {
    motors: Mutex<Box<dyn Motors>>,
    servos: Mutex<Box<dyn Servos>>,
    ultrasonic: Mutex<Box<dyn Ultrasonic>>,
    infrared: Mutex<Box<dyn Infrared>>,
    leds: Mutex<Box<dyn Leds>>,
    camera: Mutex<Box<dyn Camera>>,
    battery: Mutex<Box<dyn Battery>>,
    detector: Arc<dyn Detector>,
    fallbacks: Vec<&'static str>,
}

impl Hardware {
    pub fn builder() -> HardwareBuilder {
        HardwareBuilder::default()
    }

    /// Components running on a no-op stand-in.
    pub fn fallbacks(&self) -> &[&'static str] {
        &self.fallbacks
    }

    pub fn move_arcade(&self, x: f32, y: f32) -> Result<(), TankError> {
        lock(&self.motors, "motors")?.move_arcade(x, y)
    }

    pub fn stop(&self) -> Result<(), TankError> {
        lock(&self.motors, "motors")?.stop()
    }

    /// Drive `servo` to `angle_deg`, clamped to the mechanical range.
    pub fn set_servo(&self, servo: ServoId, angle_deg: f32) -> Result<(), TankError> {
        lock(&self.servos, "servos")?.set_angle(servo, clamp_angle(angle_deg))
    }

    pub fn servo_angle(&self, servo: ServoId) -> Option<f32> {
        lock(&self.servos, "servos").ok()?.angle(servo)
    }

    pub fn read_distances(&self) -> Result<Distances, TankError> {
        lock(&self.ultrasonic, "ultrasonic")?.get_distances()
    }

    pub fn read_infrared(&self) -> Result<[bool; 3], TankError> {
        lock(&self.infrared, "infrared")?.get_values()
    }

    pub fn read_battery(&self) -> Result<f32, TankError> {
        lock(&self.battery, "battery")?.percent()
    }

    pub fn set_leds(&self, mode: LedMode, color: Rgb) -> Result<(), TankError> {
        lock(&self.leds, "leds")?.set_mode(mode, color)
    }

    pub fn latest_frame(&self, which: CameraId) -> Option<CameraFrame> {
        lock(&self.camera, "camera").ok()?.latest_frame(which)
    }

    pub fn set_zoom(&self, which: CameraId, factor: f32) -> Result<(), TankError> {
        lock(&self.camera, "camera")?.set_zoom(which, factor)
    }

    pub async fn detect(&self, frame: &CameraFrame) -> Result<Vec<Detection>, TankError> {
        self.detector.detect(frame).await
    }
}

fn lock<'a, T: ?Sized>(
    slot: &'a Mutex<Box<T>>,
    component: &str,
) -> Result<MutexGuard<'a, Box<T>>, TankError> {
    slot.lock()
        .map_err(|_| TankError::hardware(component, "driver lock poisoned"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Collects drivers for a [`Hardware`] bundle.
#[derive(Default)]
pub struct HardwareBuilder {
    motors: Option<Box<dyn Motors>>,
    servos: Option<Box<dyn Servos>>,
    ultrasonic: Option<Box<dyn Ultrasonic>>,
    infrared: Option<Box<dyn Infrared>>,
    leds: Option<Box<dyn Leds>>,
    camera: Option<Box<dyn Camera>>,
    battery: Option<Box<dyn Battery>>,
    detector: Option<Arc<dyn Detector>>,
}

impl HardwareBuilder {
    pub fn with_motors(mut self, driver: impl Motors + 'static) -> Self {
        self.motors = Some(Box::new(driver));
        self
    }

    pub fn with_servos(mut self, driver: impl Servos + 'static) -> Self {
        self.servos = Some(Box::new(driver));
        self
    }

    pub fn with_ultrasonic(mut self, driver: impl Ultrasonic + 'static) -> Self {
        self.ultrasonic = Some(Box::new(driver));
        self
    }

    pub fn with_infrared(mut self, driver: impl Infrared + 'static) -> Self {
        self.infrared = Some(Box::new(driver));
        self
    }

    pub fn with_leds(mut self, driver: impl Leds + 'static) -> Self {
        self.leds = Some(Box::new(driver));
        self
    }

    pub fn with_camera(mut self, driver: impl Camera + 'static) -> Self {
        self.camera = Some(Box::new(driver));
        self
    }

    pub fn with_battery(mut self, driver: impl Battery + 'static) -> Self {
        self.battery = Some(Box::new(driver));
        self
    }

    pub fn with_detector(mut self, driver: impl Detector + 'static) -> Self {
        self.detector = Some(Arc::new(driver));
        self
    }

    // ── Fallible registration ────────────────────────────────────────────────

    pub fn try_motors(mut self, driver: Result<Box<dyn Motors>, TankError>) -> Self {
        self.motors = accept("motors", driver);
        self
    }

    pub fn try_servos(mut self, driver: Result<Box<dyn Servos>, TankError>) -> Self {
        self.servos = accept("servos", driver);
        self
    }

    pub fn try_ultrasonic(mut self, driver: Result<Box<dyn Ultrasonic>, TankError>) -> Self {
        self.ultrasonic = accept("ultrasonic", driver);
        self
    }

    pub fn try_infrared(mut self, driver: Result<Box<dyn Infrared>, TankError>) -> Self {
        self.infrared = accept("infrared", driver);
        self
    }

    pub fn try_leds(mut self, driver: Result<Box<dyn Leds>, TankError>) -> Self {
        self.leds = accept("leds", driver);
        self
    }

    pub fn try_camera(mut self, driver: Result<Box<dyn Camera>, TankError>) -> Self {
        self.camera = accept("camera", driver);
        self
    }

    pub fn try_battery(mut self, driver: Result<Box<dyn Battery>, TankError>) -> Self {
        self.battery = accept("battery", driver);
        self
    }

    /// Assemble the bundle, substituting a no-op stand-in for every missing
    /// driver.
    pub fn build(self) -> Hardware {
        let mut fallbacks = Vec::new();
        let mut or_noop = |component: &'static str, present: bool| {
            if !present {
                warn!(component, "no driver available; using no-op stand-in");
                fallbacks.push(component);
            }
        };
        or_noop("motors", self.motors.is_some());
        or_noop("servos", self.servos.is_some());
        or_noop("ultrasonic", self.ultrasonic.is_some());
        or_noop("infrared", self.infrared.is_some());
        or_noop("leds", self.leds.is_some());
        or_noop("camera", self.camera.is_some());
        or_noop("battery", self.battery.is_some());
        or_noop("detector", self.detector.is_some());

        Hardware {
            motors: Mutex::new(self.motors.unwrap_or_else(|| Box::new(NoopMotors))),
            servos: Mutex::new(self.servos.unwrap_or_else(|| Box::new(NoopServos))),
            ultrasonic: Mutex::new(self.ultrasonic.unwrap_or_else(|| Box::new(NoopUltrasonic))),
            infrared: Mutex::new(self.infrared.unwrap_or_else(|| Box::new(NoopInfrared))),
            leds: Mutex::new(self.leds.unwrap_or_else(|| Box::new(NoopLeds))),
            camera: Mutex::new(self.camera.unwrap_or_else(|| Box::new(NoopCamera))),
            battery: Mutex::new(self.battery.unwrap_or_else(|| Box::new(NoopBattery))),
            detector: self.detector.unwrap_or_else(|| Arc::new(NoopDetector)),
            fallbacks,
        }
    }
}

fn accept<T: ?Sized>(component: &str, driver: Result<Box<T>, TankError>) -> Option<Box<T>> {
    match driver {
        Ok(driver) => Some(driver),
        Err(e) => {
            warn!(component, error = %e, "driver failed to initialise");
            None
        }
    }
}
