//! `tankbot-cockpit` – WebSocket control surface
//!
//! A small HTTP + WebSocket server (default port `8000`) in front of a
//! [`Robot`][tankbot_runtime::Robot]:
//!
//! 1. **Health**: any plain HTTP request gets
//!    `{"status":"ok","message":"Robot API is running"}`.
//! 2. **Downstream**: every status snapshot and alert published by the robot
//!    is forwarded to each connected client.
//! 3. **Upstream**: clients send `control_command` and `set_autonomy`
//!    messages and receive a reply for each.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tankbot_cockpit::CockpitServer;
//! use tankbot_hal::SimRig;
//! use tankbot_runtime::{Robot, RobotConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let robot = Arc::new(Robot::new(SimRig::new().hardware(), RobotConfig::default()));
//!     robot.start();
//!     CockpitServer::new(robot).run().await.expect("cockpit server failed");
//! }
//! ```

pub mod server;

pub use server::{CockpitServer, DEFAULT_PORT};
