//! Operator commands: the `{command, params}` wire form and the closed
//! [`Command`] enum it decodes into.
//!
//! Decoding validates every parameter up front so the dispatcher only ever
//! sees well-formed requests.
//!
//! | command | params | notes |
//! |---|---|---|
//! | `move` | `x`, `y` | missing axes default to `0`, values clamped to `[-1, 1]` |
//! | `set_speed` | `value` | `[0, 100]` |
//! | `camera_pan` | `angle` | `[0, 180]` |
//! | `set_zoom` | `camera`, `factor` | camera defaults to `front`, factor `[1, 5]` |
//! | `arm_control` | `joint`, `value` | joint `lift` or `claw`, value `[0, 180]` |
//! | `set_led` | `mode`, `r`, `g`, `b` | channels default to `0` |
//! | `pickup`, `drop`, `track_face`, `line_tracking`, `obstacle_avoidance`, `emergency_stop` | none | |

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TankError;

/// Command exactly as received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCommand {
    pub command: String,
    #[serde(default)]
    pub params: Value,
}

impl WireCommand {
    pub fn new(command: impl Into<String>, params: Value) -> Self {
        Self {
            command: command.into(),
            params,
        }
    }

    /// A command with no parameters.
    pub fn bare(command: impl Into<String>) -> Self {
        Self::new(command, Value::Null)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hardware identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServoId {
    ArmLift,
    Claw,
    RearCam,
}

impl ServoId {
    pub fn as_str(self) -> &'static str {
        match self {
            ServoId::ArmLift => "arm_lift",
            ServoId::Claw => "claw",
            ServoId::RearCam => "rear_cam",
        }
    }
}

/// Arm joints an operator may drive directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmJoint {
    Lift,
    Claw,
}

impl ArmJoint {
    pub fn servo(self) -> ServoId {
        match self {
            ArmJoint::Lift => ServoId::ArmLift,
            ArmJoint::Claw => ServoId::Claw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraId {
    Front,
    Rear,
}

impl CameraId {
    pub fn as_str(self) -> &'static str {
        match self {
            CameraId::Front => "front",
            CameraId::Rear => "rear",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LEDs
// ─────────────────────────────────────────────────────────────────────────────

/// Animation modes understood by the LED strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedMode {
    Off,
    Static,
    Blink,
    Police,
    Ambulance,
    Chaser,
    Fire,
    Breath,
    Rainbow,
    ColorWipe,
    TheaterChase,
    Strobe,
    Twinkle,
    Sparkle,
    SolidRainbow,
    Confetti,
    Sinelon,
    Bpm,
}

impl LedMode {
    pub const ALL: [LedMode; 18] = [
        LedMode::Off,
        LedMode::Static,
        LedMode::Blink,
        LedMode::Police,
        LedMode::Ambulance,
        LedMode::Chaser,
        LedMode::Fire,
        LedMode::Breath,
        LedMode::Rainbow,
        LedMode::ColorWipe,
        LedMode::TheaterChase,
        LedMode::Strobe,
        LedMode::Twinkle,
        LedMode::Sparkle,
        LedMode::SolidRainbow,
        LedMode::Confetti,
        LedMode::Sinelon,
        LedMode::Bpm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LedMode::Off => "off",
            LedMode::Static => "static",
            LedMode::Blink => "blink",
            LedMode::Police => "police",
            LedMode::Ambulance => "ambulance",
            LedMode::Chaser => "chaser",
            LedMode::Fire => "fire",
            LedMode::Breath => "breath",
            LedMode::Rainbow => "rainbow",
            LedMode::ColorWipe => "color_wipe",
            LedMode::TheaterChase => "theater_chase",
            LedMode::Strobe => "strobe",
            LedMode::Twinkle => "twinkle",
            LedMode::Sparkle => "sparkle",
            LedMode::SolidRainbow => "solid_rainbow",
            LedMode::Confetti => "confetti",
            LedMode::Sinelon => "sinelon",
            LedMode::Bpm => "bpm",
        }
    }
}

impl FromStr for LedMode {
    type Err = TankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LedMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| invalid("set_led", format!("unknown mode {s:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command
// ─────────────────────────────────────────────────────────────────────────────

/// A validated operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Arcade drive: `x` turns, `y` is throttle.
    Move { x: f32, y: f32 },
    SetSpeed { value: f32 },
    CameraPan { angle: f32 },
    SetZoom { camera: CameraId, factor: f32 },
    ArmControl { joint: ArmJoint, value: f32 },
    Pickup,
    Drop,
    TrackFace,
    LineTracking,
    ObstacleAvoidance,
    SetLed { mode: LedMode, color: Rgb },
    EmergencyStop,
}

impl Command {
    /// Every wire name the decoder understands.
    pub const NAMES: [&'static str; 12] = [
        "move",
        "set_speed",
        "camera_pan",
        "set_zoom",
        "arm_control",
        "pickup",
        "drop",
        "track_face",
        "line_tracking",
        "obstacle_avoidance",
        "set_led",
        "emergency_stop",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Move { .. } => "move",
            Command::SetSpeed { .. } => "set_speed",
            Command::CameraPan { .. } => "camera_pan",
            Command::SetZoom { .. } => "set_zoom",
            Command::ArmControl { .. } => "arm_control",
            Command::Pickup => "pickup",
            Command::Drop => "drop",
            Command::TrackFace => "track_face",
            Command::LineTracking => "line_tracking",
            Command::ObstacleAvoidance => "obstacle_avoidance",
            Command::SetLed { .. } => "set_led",
            Command::EmergencyStop => "emergency_stop",
        }
    }

    /// Validate a [`WireCommand`].
    ///
    /// # Errors
    ///
    /// - [`TankError::InvalidCommand`] for an unknown command name.
    /// - [`TankError::InvalidParameter`] for a missing, non-numeric or
    ///   out-of-range parameter.
    pub fn decode(wire: &WireCommand) -> Result<Command, TankError> {
        let name = wire.command.as_str();
        let params = &wire.params;
        let command = match name {
            "move" => Command::Move {
                x: optional_number(name, params, "x")?
                    .unwrap_or(0.0)
                    .clamp(-1.0, 1.0),
                y: optional_number(name, params, "y")?
                    .unwrap_or(0.0)
                    .clamp(-1.0, 1.0),
            },
            "set_speed" => Command::SetSpeed {
                value: number_in(name, params, "value", 0.0..=100.0)?,
            },
            "camera_pan" => Command::CameraPan {
                angle: number_in(name, params, "angle", 0.0..=180.0)?,
            },
            "set_zoom" => Command::SetZoom {
                camera: match params.get("camera").and_then(Value::as_str) {
                    None | Some("front") => CameraId::Front,
                    Some("rear") => CameraId::Rear,
                    Some(other) => return Err(invalid(name, format!("unknown camera {other:?}"))),
                },
                factor: number_in(name, params, "factor", 1.0..=5.0)?,
            },
            "arm_control" => Command::ArmControl {
                joint: match params.get("joint").and_then(Value::as_str) {
                    Some("lift") => ArmJoint::Lift,
                    Some("claw") => ArmJoint::Claw,
                    Some(other) => return Err(invalid(name, format!("unknown joint {other:?}"))),
                    None => return Err(invalid(name, "missing joint")),
                },
                value: number_in(name, params, "value", 0.0..=180.0)?,
            },
            "pickup" => Command::Pickup,
            "drop" => Command::Drop,
            "track_face" => Command::TrackFace,
            "line_tracking" => Command::LineTracking,
            "obstacle_avoidance" => Command::ObstacleAvoidance,
            "set_led" => Command::SetLed {
                mode: params
                    .get("mode")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid(name, "missing mode"))?
                    .parse()?,
                color: Rgb::new(
                    channel(name, params, "r")?,
                    channel(name, params, "g")?,
                    channel(name, params, "b")?,
                ),
            },
            "emergency_stop" => Command::EmergencyStop,
            other => return Err(TankError::InvalidCommand(other.to_string())),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&WireCommand> for Command {
    type Error = TankError;

    fn try_from(wire: &WireCommand) -> Result<Self, Self::Error> {
        Command::decode(wire)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter helpers
// ─────────────────────────────────────────────────────────────────────────────

fn invalid(command: &str, details: impl Into<String>) -> TankError {
    TankError::InvalidParameter {
        command: command.to_string(),
        details: details.into(),
    }
}

fn optional_number(command: &str, params: &Value, key: &str) -> Result<Option<f32>, TankError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(|n| Some(n as f32))
            .ok_or_else(|| invalid(command, format!("{key} must be numeric"))),
    }
}

fn number_in(
    command: &str,
    params: &Value,
    key: &str,
    range: RangeInclusive<f32>,
) -> Result<f32, TankError> {
    let value = optional_number(command, params, key)?
        .ok_or_else(|| invalid(command, format!("missing {key}")))?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid(
            command,
            format!("{key}={value} outside [{}, {}]", range.start(), range.end()),
        ))
    }
}

fn channel(command: &str, params: &Value, key: &str) -> Result<u8, TankError> {
    let value = optional_number(command, params, key)?.unwrap_or(0.0);
    if (0.0..=255.0).contains(&value) {
        Ok(value.round() as u8)
    } else {
        Err(invalid(command, format!("{key}={value} outside [0, 255]")))
    }
}
