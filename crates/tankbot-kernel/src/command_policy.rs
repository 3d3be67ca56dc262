//! [`CommandPolicy`] – which operator commands each autonomy level accepts.
//!
//! Before a decoded command is applied, the dispatcher calls
//! [`CommandPolicy::check`] with the current [`AutonomyLevel`].  A rejected
//! command is dropped (logged, no state change); it is not an error for the
//! caller.
//!
//! [`CommandPolicy::standard`] grants every command in MANUAL and SEMI_AUTO
//! and only [`FULL_AUTO_COMMANDS`] in FULL_AUTO, so direct driving and arm
//! control cannot fight the running behaviors.

use std::collections::{HashMap, HashSet};

use tankbot_types::{AutonomyLevel, Command, TankError};

/// Commands accepted while the robot drives itself.
pub const FULL_AUTO_COMMANDS: [&str; 8] = [
    "emergency_stop",
    "track_face",
    "line_tracking",
    "obstacle_avoidance",
    "pickup",
    "drop",
    "set_speed",
    "set_led",
];

/// Per-level allow-list of command names.
///
/// # Example
///
/// ```
/// use tankbot_kernel::command_policy::CommandPolicy;
/// use tankbot_types::AutonomyLevel;
///
/// let policy = CommandPolicy::standard();
/// assert!(policy.check(AutonomyLevel::Manual, "move").is_ok());
/// assert!(policy.check(AutonomyLevel::FullAuto, "move").is_err());
/// assert!(policy.check(AutonomyLevel::FullAuto, "emergency_stop").is_ok());
/// ```
#[derive(Debug, Default)]
pub struct CommandPolicy {
    grants: HashMap<AutonomyLevel, HashSet<String>>,
}

impl CommandPolicy {
    /// Create an empty policy; every command is rejected.
    pub fn new() -> Self {
        Self::default()
    }

    /// The robot's standard policy.
    pub fn standard() -> Self {
        let mut policy = Self::new();
        for name in Command::NAMES {
            policy.grant(AutonomyLevel::Manual, name);
            policy.grant(AutonomyLevel::SemiAuto, name);
        }
        for name in FULL_AUTO_COMMANDS {
            policy.grant(AutonomyLevel::FullAuto, name);
        }
        policy
    }

    /// Allow `command` at `level`.  Duplicate grants are ignored.
    pub fn grant(&mut self, level: AutonomyLevel, command: &str) {
        self.grants
            .entry(level)
            .or_default()
            .insert(command.to_string());
    }

    /// Disallow `command` at `level`.  No-op if it was never granted.
    pub fn revoke(&mut self, level: AutonomyLevel, command: &str) {
        if let Some(set) = self.grants.get_mut(&level) {
            set.remove(command);
        }
    }

    /// `Ok(())` when `command` is allowed at `level`, otherwise
    /// [`TankError::CommandNotPermitted`].
    pub fn check(&self, level: AutonomyLevel, command: &str) -> Result<(), TankError> {
        let allowed = self
            .grants
            .get(&level)
            .is_some_and(|set| set.contains(command));
        if allowed {
            Ok(())
        } else {
            Err(TankError::CommandNotPermitted {
                command: command.to_string(),
                level,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_and_semi_accept_everything() {
        let policy = CommandPolicy::standard();
        for name in Command::NAMES {
            assert!(policy.check(AutonomyLevel::Manual, name).is_ok(), "{name}");
            assert!(policy.check(AutonomyLevel::SemiAuto, name).is_ok(), "{name}");
        }
    }

    #[test]
    fn full_auto_accepts_only_its_list() {
        let policy = CommandPolicy::standard();
        for name in Command::NAMES {
            let expected = FULL_AUTO_COMMANDS.contains(&name);
            assert_eq!(
                policy.check(AutonomyLevel::FullAuto, name).is_ok(),
                expected,
                "{name}"
            );
        }
    }

    #[test]
    fn full_auto_rejects_manual_driving() {
        let policy = CommandPolicy::standard();
        for name in ["move", "arm_control", "camera_pan", "set_zoom"] {
            let result = policy.check(AutonomyLevel::FullAuto, name);
            assert!(matches!(result, Err(TankError::CommandNotPermitted { .. })));
        }
    }

    #[test]
    fn empty_policy_rejects() {
        let policy = CommandPolicy::new();
        assert!(policy.check(AutonomyLevel::Manual, "move").is_err());
    }

    #[test]
    fn revoke_removes_grant() {
        let mut policy = CommandPolicy::standard();
        policy.revoke(AutonomyLevel::SemiAuto, "arm_control");
        assert!(policy.check(AutonomyLevel::SemiAuto, "arm_control").is_err());
        assert!(policy.check(AutonomyLevel::Manual, "arm_control").is_ok());
    }

    #[test]
    fn revoke_nonexistent_is_noop() {
        let mut policy = CommandPolicy::new();
        policy.revoke(AutonomyLevel::FullAuto, "move");
        assert!(policy.check(AutonomyLevel::FullAuto, "move").is_err());
    }

    #[test]
    fn duplicate_grant_is_idempotent() {
        let mut policy = CommandPolicy::new();
        policy.grant(AutonomyLevel::FullAuto, "move");
        policy.grant(AutonomyLevel::FullAuto, "move");
        policy.revoke(AutonomyLevel::FullAuto, "move");
        assert!(policy.check(AutonomyLevel::FullAuto, "move").is_err());
    }
}
