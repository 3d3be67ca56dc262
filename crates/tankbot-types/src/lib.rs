//! Shared data model for the tankbot workspace.
//!
//! Everything that crosses a crate boundary lives here: the robot's logical
//! state, the sensor snapshot, decoded operator [`Command`]s, bus [`Event`]s
//! and the workspace-wide [`TankError`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod command;

pub use command::{ArmJoint, CameraId, Command, LedMode, Rgb, ServoId, WireCommand};

// ─────────────────────────────────────────────────────────────────────────────
// Autonomy
// ─────────────────────────────────────────────────────────────────────────────

/// Who is allowed to drive the robot.
///
/// The wire spelling (`"manual"`, `"semi"`, `"auto"`) is what operators send
/// with `set_autonomy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutonomyLevel {
    /// Operator has full control; safety rules limited to cliff detection.
    #[default]
    #[serde(rename = "manual")]
    Manual,
    /// Operator drives, proximity stop is armed.
    #[serde(rename = "semi")]
    SemiAuto,
    /// Behaviors drive; only a reduced command set is accepted.
    #[serde(rename = "auto")]
    FullAuto,
}

impl AutonomyLevel {
    /// Every level, in escalating order.
    pub const ALL: [AutonomyLevel; 3] = [
        AutonomyLevel::Manual,
        AutonomyLevel::SemiAuto,
        AutonomyLevel::FullAuto,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AutonomyLevel::Manual => "manual",
            AutonomyLevel::SemiAuto => "semi",
            AutonomyLevel::FullAuto => "auto",
        }
    }

    /// `true` for levels where the proximity stop is armed.
    pub fn is_assisted(self) -> bool {
        matches!(self, AutonomyLevel::SemiAuto | AutonomyLevel::FullAuto)
    }
}

impl fmt::Display for AutonomyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutonomyLevel {
    type Err = TankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(AutonomyLevel::Manual),
            "semi" => Ok(AutonomyLevel::SemiAuto),
            "auto" => Ok(AutonomyLevel::FullAuto),
            other => Err(TankError::InvalidAutonomyLevel(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status and behaviors
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse activity tag reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    #[default]
    Standby,
    Moving,
    BlockedFront,
    BlockedRear,
    TrackingFace,
    LineTracking,
    ObstacleAvoidance,
    PickupApproach,
    PickupLifting,
    Holding,
    Dropping,
    OperatingArm,
    Error,
}

/// The exclusive, long-running behaviors the supervisor can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    FaceTrack,
    LineTrack,
    ObstacleAvoid,
    Pickup,
}

impl BehaviorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorKind::FaceTrack => "face_track",
            BehaviorKind::LineTrack => "line_track",
            BehaviorKind::ObstacleAvoid => "obstacle_avoid",
            BehaviorKind::Pickup => "pickup",
        }
    }

    /// Status reported while the behavior owns the actuators.
    pub fn status(self) -> RobotStatus {
        match self {
            BehaviorKind::FaceTrack => RobotStatus::TrackingFace,
            BehaviorKind::LineTrack => RobotStatus::LineTracking,
            BehaviorKind::ObstacleAvoid => RobotStatus::ObstacleAvoidance,
            BehaviorKind::Pickup => RobotStatus::PickupApproach,
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Robot state
// ─────────────────────────────────────────────────────────────────────────────

/// Latest sensor readings. `None` distances mean "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub front_distance_cm: Option<f32>,
    pub rear_distance_cm: Option<f32>,
    /// Left, center, right. `true` means the channel sees no floor (or a line).
    pub infrared: [bool; 3],
}

impl SensorSnapshot {
    /// `true` when any infrared channel is active.
    pub fn cliff_detected(&self) -> bool {
        self.infrared.iter().any(|&active| active)
    }
}

/// The single logical state of the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub autonomy_level: AutonomyLevel,
    pub status: RobotStatus,
    /// Battery charge in percent, `[0, 100]`.
    pub battery: f32,
    pub sensors: SensorSnapshot,
    /// Throttle applied to every drive magnitude, `[0, 100]`.
    pub speed_limit_percent: f32,
    pub active_behavior: Option<BehaviorKind>,
}

impl RobotState {
    /// `speed_limit_percent` as a `[0, 1]` factor.
    pub fn speed_factor(&self) -> f32 {
        (self.speed_limit_percent / 100.0).clamp(0.0, 1.0)
    }
}

impl Default for RobotState {
    fn default() -> Self {
        Self {
            autonomy_level: AutonomyLevel::Manual,
            status: RobotStatus::Standby,
            battery: 100.0,
            sensors: SensorSnapshot::default(),
            speed_limit_percent: 100.0,
            active_behavior: None,
        }
    }
}

/// A single object reported by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in frame pixels.
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn center_x(&self) -> f32 {
        (self.bbox[0] + self.bbox[2]) / 2.0
    }

    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).abs() * (self.bbox[3] - self.bbox[1]).abs()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus events
// ─────────────────────────────────────────────────────────────────────────────

/// Envelope routed over the status bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"tankbot-runtime::state_store"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full state snapshot.
    Status(RobotState),
    Alert(Alert),
}

/// Out-of-band notifications that are not part of [`RobotState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum Alert {
    /// A drive request was replaced by a stop.
    SafetyVeto { rule: String, x: f32, y: f32 },
    /// A behavior ended on a hardware error or panic.
    BehaviorFault { behavior: BehaviorKind, details: String },
    EmergencyStop { origin: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TankError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Hardware Unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("Invalid Command: {0}")]
    InvalidCommand(String),

    #[error("Invalid Parameter for {command}: {details}")]
    InvalidParameter { command: String, details: String },

    #[error("Command {command} not permitted at autonomy level {level}")]
    CommandNotPermitted { command: String, level: AutonomyLevel },

    #[error("Invalid Autonomy Level: {0}")]
    InvalidAutonomyLevel(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Config Error: {0}")]
    Config(String),
}

impl TankError {
    pub fn hardware(component: impl Into<String>, details: impl fmt::Display) -> Self {
        TankError::HardwareFault {
            component: component.into(),
            details: details.to_string(),
        }
    }
}
