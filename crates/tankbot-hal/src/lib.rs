//! `tankbot-hal` – Hardware Abstraction Layer
//!
//! The orchestration core never talks to a device directly.  It holds a
//! [`Hardware`] bundle of trait objects, one per collaborator, each behind its
//! own lock.
//!
//! # Modules
//!
//! - [`motors`] – [`Motors`]: arcade-drive tracked chassis.
//! - [`servos`] – [`Servos`]: arm lift, claw and rear camera pan.
//! - [`sensors`] – [`Ultrasonic`], [`Infrared`] and [`Battery`] readers.
//! - [`leds`] – [`Leds`]: the status strip.
//! - [`camera`] – [`Camera`]: latest-frame access and digital zoom.
//! - [`detector`] – [`Detector`]: asynchronous object detection.
//! - [`hardware`] – [`Hardware`] bundle and [`HardwareBuilder`], which
//!   substitutes [`noop`] drivers for anything unavailable.
//! - [`sim`] – recording simulation drivers for tests and mock mode.

pub mod camera;
pub mod detector;
pub mod hardware;
pub mod leds;
pub mod motors;
pub mod noop;
pub mod sensors;
pub mod servos;
pub mod sim;

pub use camera::{Camera, CameraFrame};
pub use detector::Detector;
pub use hardware::{Hardware, HardwareBuilder};
pub use leds::Leds;
pub use motors::Motors;
pub use sensors::{Battery, Distances, Infrared, Ultrasonic};
pub use servos::Servos;
pub use sim::SimRig;
