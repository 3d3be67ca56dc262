//! In-process simulation drivers for tests and mock mode.
//!
//! Every driver is a cheap, cloneable handle around shared state: hand one
//! clone to a [`Hardware`] bundle and keep the other to script sensor
//! readings or inspect what the core commanded.
//!
//! | Driver | Stub behaviour |
//! |---|---|
//! | [`SimMotors`] | Records the latest [`SIM_LOG_CAPACITY`] [`MotorCommand`]s. |
//! | [`SimServos`] | Stores angles and records recent `set_angle` calls. |
//! | [`SimUltrasonic`] | Returns scripted [`Distances`], or random ones while wandering; can be told to fail. |
//! | [`SimInfrared`] | Returns scripted channel values. |
//! | [`SimLeds`] | Records recent mode changes. |
//! | [`SimCamera`] | Returns a blank frame of fixed size and stores zoom factors. |
//! | [`SimDetector`] | Returns scripted detections. |
//! | [`SimBattery`] | Drains a fixed amount per read. |
//!
//! # Example
//!
//! ```rust
//! use tankbot_hal::sim::{MotorCommand, SimRig};
//!
//! let rig = SimRig::new();
//! let hw = rig.hardware();
//!
//! rig.ultrasonic.set(Some(12.0), None);
//! assert_eq!(hw.read_distances().unwrap().front, Some(12.0));
//!
//! hw.move_arcade(0.0, 0.4).unwrap();
//! assert_eq!(rig.motors.last(), Some(MotorCommand::Move { x: 0.0, y: 0.4 }));
//! ```

use std::collections::{HashMap, VecDeque};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rand::Rng;
use tankbot_types::{CameraId, Detection, LedMode, Rgb, ServoId, TankError};

use crate::camera::{Camera, CameraFrame};
use crate::detector::Detector;
use crate::hardware::Hardware;
use crate::leds::Leds;
use crate::motors::Motors;
use crate::sensors::{Battery, Distances, Infrared, Ultrasonic};
use crate::servos::Servos;

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entries kept by each recording driver; older ones are discarded.
pub const SIM_LOG_CAPACITY: usize = 1024;

/// Bounded, shared command log.
#[derive(Clone)]
struct Journal<T>(Arc<Mutex<VecDeque<T>>>);

impl<T> Default for Journal<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(VecDeque::new())))
    }
}

impl<T: Clone> Journal<T> {
    fn push(&self, entry: T) {
        let mut log = guard(&self.0);
        if log.len() == SIM_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(entry);
    }

    fn entries(&self) -> Vec<T> {
        guard(&self.0).iter().cloned().collect()
    }

    fn last(&self) -> Option<T> {
        guard(&self.0).back().cloned()
    }

    fn clear(&self) {
        guard(&self.0).clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Motors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorCommand {
    Move { x: f32, y: f32 },
    Stop,
}

#[derive(Clone, Default)]
pub struct SimMotors {
    log: Journal<MotorCommand>,
}

impl SimMotors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recent commands, oldest first.
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.log.entries()
    }

    pub fn last(&self) -> Option<MotorCommand> {
        self.log.last()
    }

    pub fn clear(&self) {
        self.log.clear();
    }
}

impl Motors for SimMotors {
    fn id(&self) -> &str {
        "sim_tracks"
    }

    fn move_arcade(&mut self, x: f32, y: f32) -> Result<(), TankError> {
        self.log.push(MotorCommand::Move { x, y });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TankError> {
        self.log.push(MotorCommand::Stop);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Servos
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SimServos {
    angles: Arc<Mutex<HashMap<ServoId, f32>>>,
    log: Journal<(ServoId, f32)>,
}

impl SimServos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recent `(servo, angle)` writes, oldest first.
    pub fn writes(&self) -> Vec<(ServoId, f32)> {
        self.log.entries()
    }

    /// Writes to a single servo.
    pub fn writes_to(&self, servo: ServoId) -> Vec<f32> {
        guard(&self.log.0)
            .iter()
            .filter(|(id, _)| *id == servo)
            .map(|(_, angle)| *angle)
            .collect()
    }
}

impl Servos for SimServos {
    fn set_angle(&mut self, servo: ServoId, angle_deg: f32) -> Result<(), TankError> {
        guard(&self.angles).insert(servo, angle_deg);
        self.log.push((servo, angle_deg));
        Ok(())
    }

    fn angle(&self, servo: ServoId) -> Option<f32> {
        guard(&self.angles).get(&servo).copied()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ultrasonic
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SimUltrasonic {
    readings: Arc<Mutex<Distances>>,
    failing: Arc<AtomicBool>,
    wandering: Arc<AtomicBool>,
}

/// Range of the random readings produced while wandering, in cm.
pub const SIM_WANDER_RANGE_CM: RangeInclusive<f32> = 10.0..=200.0;

impl SimUltrasonic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, front: Option<f32>, rear: Option<f32>) {
        *guard(&self.readings) = Distances { front, rear };
    }

    /// Make subsequent reads fail with a hardware fault.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// While wandering, every read draws fresh front and rear distances from
    /// [`SIM_WANDER_RANGE_CM`] instead of returning the scripted ones.
    pub fn set_wandering(&self, wandering: bool) {
        self.wandering.store(wandering, Ordering::SeqCst);
    }
}

impl Ultrasonic for SimUltrasonic {
    fn get_distances(&mut self) -> Result<Distances, TankError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TankError::hardware("ultrasonic", "echo timeout"));
        }
        if self.wandering.load(Ordering::SeqCst) {
            let mut rng = rand::thread_rng();
            let mut readings = guard(&self.readings);
            *readings = Distances {
                front: Some(rng.gen_range(SIM_WANDER_RANGE_CM)),
                rear: Some(rng.gen_range(SIM_WANDER_RANGE_CM)),
            };
            return Ok(*readings);
        }
        Ok(*guard(&self.readings))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Infrared
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SimInfrared {
    values: Arc<Mutex<[bool; 3]>>,
}

impl SimInfrared {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, values: [bool; 3]) {
        *guard(&self.values) = values;
    }
}

impl Infrared for SimInfrared {
    fn get_values(&mut self) -> Result<[bool; 3], TankError> {
        Ok(*guard(&self.values))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LEDs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SimLeds {
    log: Journal<(LedMode, Rgb)>,
}

impl SimLeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<(LedMode, Rgb)> {
        self.log.last()
    }

    pub fn modes(&self) -> Vec<LedMode> {
        guard(&self.log.0).iter().map(|(mode, _)| *mode).collect()
    }
}

impl Leds for SimLeds {
    fn set_mode(&mut self, mode: LedMode, color: Rgb) -> Result<(), TankError> {
        self.log.push((mode, color));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Camera and detector
// ─────────────────────────────────────────────────────────────────────────────

/// Default simulated frame size, matching the front camera's stream.
pub const SIM_FRAME_SIZE: (u32, u32) = (640, 480);

#[derive(Clone)]
pub struct SimCamera {
    width: u32,
    height: u32,
    online: Arc<AtomicBool>,
    zoom: Arc<Mutex<HashMap<CameraId, f32>>>,
}

impl SimCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            online: Arc::new(AtomicBool::new(true)),
            zoom: Arc::default(),
        }
    }

    /// When offline, `latest_frame` returns `None`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn zoom(&self, which: CameraId) -> Option<f32> {
        guard(&self.zoom).get(&which).copied()
    }
}

impl Default for SimCamera {
    fn default() -> Self {
        Self::new(SIM_FRAME_SIZE.0, SIM_FRAME_SIZE.1)
    }
}

impl Camera for SimCamera {
    fn latest_frame(&mut self, _which: CameraId) -> Option<CameraFrame> {
        self.online
            .load(Ordering::SeqCst)
            .then(|| CameraFrame::blank(self.width, self.height))
    }

    fn set_zoom(&mut self, which: CameraId, factor: f32) -> Result<(), TankError> {
        guard(&self.zoom).insert(which, factor);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SimDetector {
    detections: Arc<Mutex<Vec<Detection>>>,
}

impl SimDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace what every subsequent `detect` call returns.
    pub fn set(&self, detections: Vec<Detection>) {
        *guard(&self.detections) = detections;
    }
}

#[async_trait]
impl Detector for SimDetector {
    async fn detect(&self, _frame: &CameraFrame) -> Result<Vec<Detection>, TankError> {
        Ok(guard(&self.detections).clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Battery
// ─────────────────────────────────────────────────────────────────────────────

/// Percent drained per read in mock mode.
pub const SIM_BATTERY_DRAIN: f32 = 0.01;

#[derive(Clone)]
pub struct SimBattery {
    level: Arc<Mutex<f32>>,
    drain_per_read: f32,
}

impl SimBattery {
    pub fn new(level: f32, drain_per_read: f32) -> Self {
        Self {
            level: Arc::new(Mutex::new(level)),
            drain_per_read,
        }
    }

    pub fn level(&self) -> f32 {
        *guard(&self.level)
    }
}

impl Default for SimBattery {
    fn default() -> Self {
        Self::new(100.0, SIM_BATTERY_DRAIN)
    }
}

impl Battery for SimBattery {
    fn percent(&mut self) -> Result<f32, TankError> {
        let mut level = guard(&self.level);
        *level = (*level - self.drain_per_read).max(0.0);
        Ok(*level)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SimRig
// ─────────────────────────────────────────────────────────────────────────────

/// One handle per simulated collaborator.
#[derive(Clone, Default)]
pub struct SimRig {
    pub motors: SimMotors,
    pub servos: SimServos,
    pub ultrasonic: SimUltrasonic,
    pub infrared: SimInfrared,
    pub leds: SimLeds,
    pub camera: SimCamera,
    pub detector: SimDetector,
    pub battery: SimBattery,
}

impl SimRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rig for running without hardware: the ultrasonic sensor wanders so
    /// distance-driven behaviors have something to react to.
    pub fn mock() -> Self {
        let rig = Self::default();
        rig.ultrasonic.set_wandering(true);
        rig
    }

    /// A [`Hardware`] bundle wired to clones of this rig's handles.
    pub fn hardware(&self) -> Hardware {
        Hardware::builder()
            .with_motors(self.motors.clone())
            .with_servos(self.servos.clone())
            .with_ultrasonic(self.ultrasonic.clone())
            .with_infrared(self.infrared.clone())
            .with_leds(self.leds.clone())
            .with_camera(self.camera.clone())
            .with_detector(self.detector.clone())
            .with_battery(self.battery.clone())
            .build()
    }
}
