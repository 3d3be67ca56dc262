//! `tankbot-runtime` – The Orchestration Core
//!
//! Turns operator commands and sensor readings into safe actuator calls.
//!
//! # Modules
//!
//! - [`robot`] – [`Robot`]: command dispatcher, autonomy level transitions,
//!   emergency stop and lifecycle.  Every drive request passes through the
//!   [`SafetyMonitor`][tankbot_kernel::SafetyMonitor].
//! - [`state_store`] – [`StateStore`]: the single [`RobotState`][tankbot_types::RobotState],
//!   published on every mutation.
//! - `supervisor` – the exclusive behavior slot (cancel-then-start).
//! - `behaviors` – obstacle avoidance, line tracking, face tracking and
//!   pickup, each an async loop with cooperative cancellation.
//! - `sensor_loop` – periodic sensor polling and the ~2 Hz status push.
//! - [`config`] – [`RobotConfig`] cadences and thresholds.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console and
//!   optional OTLP tracing setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use tankbot_hal::SimRig;
//! use tankbot_runtime::{Robot, RobotConfig};
//! use tankbot_types::WireCommand;
//!
//! # async fn demo() {
//! let rig = SimRig::new();
//! let robot = Robot::new(rig.hardware(), RobotConfig::default());
//! robot.start();
//! robot.execute(&WireCommand::bare("obstacle_avoidance")).await;
//! robot.shutdown().await;
//! # }
//! ```

mod behaviors;
pub mod config;
pub mod robot;
mod sensor_loop;
pub mod state_store;
mod supervisor;
pub mod telemetry;

pub use config::RobotConfig;
pub use robot::{DispatchOutcome, Robot};
pub use state_store::StateStore;
pub use telemetry::{TelemetryGuard, init_tracing};
