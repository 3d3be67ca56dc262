//! Runtime tuning for the orchestration core.
//!
//! Deserializes from the `[robot]` table of the CLI config file; every field
//! has a default so a partial table is fine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tankbot_kernel::safety::DEFAULT_PROXIMITY_STOP_CM;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Sensor loop poll period.
    #[serde(default = "default_sensor_poll_ms")]
    pub sensor_poll_ms: u64,

    /// Period of the unconditional status push.
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// How long a cancelled behavior may take to clean up before it is
    /// aborted.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Proximity rule threshold in SEMI and FULL autonomy.
    #[serde(default = "default_proximity_stop_cm")]
    pub proximity_stop_cm: f32,
}

fn default_sensor_poll_ms() -> u64 {
    100
}
fn default_status_interval_ms() -> u64 {
    500
}
fn default_cancel_grace_ms() -> u64 {
    250
}
fn default_proximity_stop_cm() -> f32 {
    DEFAULT_PROXIMITY_STOP_CM
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            sensor_poll_ms: default_sensor_poll_ms(),
            status_interval_ms: default_status_interval_ms(),
            cancel_grace_ms: default_cancel_grace_ms(),
            proximity_stop_cm: default_proximity_stop_cm(),
        }
    }
}

impl RobotConfig {
    pub fn sensor_poll(&self) -> Duration {
        Duration::from_millis(self.sensor_poll_ms.max(1))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(1))
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_cadence() {
        let cfg = RobotConfig::default();
        assert_eq!(cfg.sensor_poll(), Duration::from_millis(100));
        assert_eq!(cfg.status_interval(), Duration::from_millis(500));
        assert_eq!(cfg.cancel_grace(), Duration::from_millis(250));
        assert_eq!(cfg.proximity_stop_cm, 15.0);
    }

    #[test]
    fn zero_periods_are_floored() {
        let cfg = RobotConfig {
            sensor_poll_ms: 0,
            status_interval_ms: 0,
            ..RobotConfig::default()
        };
        assert_eq!(cfg.sensor_poll(), Duration::from_millis(1));
        assert_eq!(cfg.status_interval(), Duration::from_millis(1));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: RobotConfig = serde_json::from_str(r#"{"sensor_poll_ms": 50}"#).unwrap();
        assert_eq!(cfg.sensor_poll_ms, 50);
        assert_eq!(cfg.status_interval_ms, 500);
    }
}
