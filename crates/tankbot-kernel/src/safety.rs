//! [`SafetyMonitor`] – drive-request interlock / rule engine.
//!
//! Every arcade-drive request, whether typed by an operator or issued by a
//! behavior, is passed through [`SafetyMonitor::evaluate`] before it reaches
//! the motors.  Rules are evaluated in order and the first veto wins; the
//! caller stops the motors instead of applying the request.
//!
//! Two built-in rules make up [`SafetyMonitor::standard`]:
//!
//! | Rule | Fires when | Verdict |
//! |---|---|---|
//! | [`CliffRule`] | the request goes forward, or turns in place, while any infrared channel is active | [`SafetyVerdict::BlockedCliff`] |
//! | [`ProximityRule`] | SEMI/FULL autonomy and the obstacle in the direction of travel is closer than the threshold | [`SafetyVerdict::BlockedFront`] / [`SafetyVerdict::BlockedRear`] |
//!
//! Reversing is never vetoed by the cliff rule, and an unknown distance can
//! never trigger the proximity rule.
//!
//! Under [`DriveProfile::LineFollowing`] the active channels are expected to
//! be the tracked line, so the cliff rule only fires when both outer channels
//! are active at once, a pattern no single line can produce.  Line following
//! is therefore the one drive path where a lone active channel does not
//! block forward motion.
//!
//! # Example
//!
//! ```
//! use tankbot_kernel::safety::{DriveRequest, SafetyContext, SafetyMonitor, SafetyVerdict};
//! use tankbot_types::{AutonomyLevel, SensorSnapshot};
//!
//! let monitor = SafetyMonitor::standard(15.0);
//! let sensors = SensorSnapshot { front_distance_cm: Some(10.0), ..Default::default() };
//! let ctx = SafetyContext::new(AutonomyLevel::SemiAuto, &sensors);
//!
//! assert_eq!(monitor.evaluate(DriveRequest::new(0.0, 0.5), &ctx), SafetyVerdict::BlockedFront);
//! assert_eq!(monitor.evaluate(DriveRequest::new(0.0, -0.5), &ctx), SafetyVerdict::Allow);
//! ```

use std::fmt;

use tankbot_types::{AutonomyLevel, RobotStatus, SensorSnapshot};
use tracing::debug;

/// Default proximity stop distance, in centimetres.
pub const DEFAULT_PROXIMITY_STOP_CM: f32 = 15.0;

/// Front stop distance while docking, in centimetres.
pub const DEFAULT_DOCKING_STOP_CM: f32 = 5.0;

// ────────────────────────────────────────────────────────────────────────────
// Inputs and verdict
// ────────────────────────────────────────────────────────────────────────────

/// An arcade-drive request after speed limiting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveRequest {
    /// Turn component, `[-1, 1]`.
    pub x: f32,
    /// Throttle, `[-1, 1]`.  Positive is forward.
    pub y: f32,
}

impl DriveRequest {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_forward(&self) -> bool {
        self.y > 0.0
    }

    pub fn is_reverse(&self) -> bool {
        self.y < 0.0
    }

    /// Pure rotation with no throttle.
    pub fn is_turn_in_place(&self) -> bool {
        self.x != 0.0 && self.y == 0.0
    }
}

/// How a request should be judged, chosen by whoever issues it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveProfile {
    /// Both rules at full strength.
    #[default]
    Standard,
    /// An active infrared channel is the tracked line, not an edge: the
    /// cliff rule only fires when both outer channels see it.
    LineFollowing,
    /// Closing in on an object on purpose: the front proximity threshold
    /// drops to [`ProximityRule::docking_cm`].
    Docking,
}

/// Everything a rule may look at besides the request itself.
#[derive(Debug, Clone, Copy)]
pub struct SafetyContext<'a> {
    pub autonomy: AutonomyLevel,
    pub sensors: &'a SensorSnapshot,
    pub profile: DriveProfile,
}

impl<'a> SafetyContext<'a> {
    pub fn new(autonomy: AutonomyLevel, sensors: &'a SensorSnapshot) -> Self {
        Self {
            autonomy,
            sensors,
            profile: DriveProfile::Standard,
        }
    }

    pub fn with_profile(mut self, profile: DriveProfile) -> Self {
        self.profile = profile;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Allow,
    BlockedFront,
    BlockedRear,
    BlockedCliff,
}

impl SafetyVerdict {
    pub fn is_allowed(self) -> bool {
        self == SafetyVerdict::Allow
    }

    /// Status to report after a veto.  A cliff is reported as a front block.
    pub fn blocked_status(self) -> Option<RobotStatus> {
        match self {
            SafetyVerdict::Allow => None,
            SafetyVerdict::BlockedFront | SafetyVerdict::BlockedCliff => {
                Some(RobotStatus::BlockedFront)
            }
            SafetyVerdict::BlockedRear => Some(RobotStatus::BlockedRear),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SafetyVerdict::Allow => "allow",
            SafetyVerdict::BlockedFront => "blocked_front",
            SafetyVerdict::BlockedRear => "blocked_rear",
            SafetyVerdict::BlockedCliff => "blocked_cliff",
        }
    }
}

impl fmt::Display for SafetyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single condition under which a drive request must not be applied.
///
/// Implement this trait to add custom rules to a [`SafetyMonitor`] via
/// [`SafetyMonitor::add_rule`].
pub trait SafetyRule: Send + Sync {
    /// Human-readable name used in logs and alerts.
    fn name(&self) -> &str;

    /// Return [`SafetyVerdict::Allow`] or the veto this rule imposes.
    fn check(&self, request: DriveRequest, ctx: &SafetyContext<'_>) -> SafetyVerdict;
}

// ────────────────────────────────────────────────────────────────────────────
// SafetyMonitor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SafetyMonitor {
    rules: Vec<Box<dyn SafetyRule>>,
}

impl SafetyMonitor {
    /// A monitor with no rules; everything is allowed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cliff rule followed by a proximity rule at `proximity_stop_cm`.
    pub fn standard(proximity_stop_cm: f32) -> Self {
        let mut monitor = Self::new();
        monitor.add_rule(Box::new(CliffRule));
        monitor.add_rule(Box::new(ProximityRule::new(proximity_stop_cm)));
        monitor
    }

    /// Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn SafetyRule>) {
        self.rules.push(rule);
    }

    /// First veto among the registered rules, or [`SafetyVerdict::Allow`].
    pub fn evaluate(&self, request: DriveRequest, ctx: &SafetyContext<'_>) -> SafetyVerdict {
        self.first_veto(request, ctx)
            .map(|(_, verdict)| verdict)
            .unwrap_or(SafetyVerdict::Allow)
    }

    /// Like [`evaluate`][Self::evaluate] but also names the rule that fired.
    pub fn first_veto(
        &self,
        request: DriveRequest,
        ctx: &SafetyContext<'_>,
    ) -> Option<(&str, SafetyVerdict)> {
        self.rules.iter().find_map(|rule| {
            let verdict = rule.check(request, ctx);
            if verdict.is_allowed() {
                None
            } else {
                debug!(rule = rule.name(), %verdict, x = request.x, y = request.y, "drive request vetoed");
                Some((rule.name(), verdict))
            }
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Vetoes forward motion and turns in place while any infrared channel is
/// active.
pub struct CliffRule;

impl SafetyRule for CliffRule {
    fn name(&self) -> &str {
        "cliff"
    }

    fn check(&self, request: DriveRequest, ctx: &SafetyContext<'_>) -> SafetyVerdict {
        let [left, _, right] = ctx.sensors.infrared;
        let edge = match ctx.profile {
            DriveProfile::LineFollowing => left && right,
            _ => ctx.sensors.cliff_detected(),
        };
        let advancing = request.is_forward() || request.is_turn_in_place();
        if advancing && edge {
            SafetyVerdict::BlockedCliff
        } else {
            SafetyVerdict::Allow
        }
    }
}

/// Vetoes motion toward an obstacle closer than `threshold_cm` (strictly),
/// only in SEMI and FULL autonomy.
pub struct ProximityRule {
    pub threshold_cm: f32,
    /// Front threshold under [`DriveProfile::Docking`].
    pub docking_cm: f32,
}

impl ProximityRule {
    pub fn new(threshold_cm: f32) -> Self {
        Self {
            threshold_cm,
            docking_cm: DEFAULT_DOCKING_STOP_CM.min(threshold_cm),
        }
    }
}

impl Default for ProximityRule {
    fn default() -> Self {
        Self::new(DEFAULT_PROXIMITY_STOP_CM)
    }
}

impl SafetyRule for ProximityRule {
    fn name(&self) -> &str {
        "proximity"
    }

    fn check(&self, request: DriveRequest, ctx: &SafetyContext<'_>) -> SafetyVerdict {
        if !ctx.autonomy.is_assisted() {
            return SafetyVerdict::Allow;
        }
        let front_cm = match ctx.profile {
            DriveProfile::Docking => self.docking_cm,
            _ => self.threshold_cm,
        };
        let closer_than = |d: Option<f32>, limit: f32| d.is_some_and(|d| d < limit);
        if request.is_forward() && closer_than(ctx.sensors.front_distance_cm, front_cm) {
            SafetyVerdict::BlockedFront
        } else if request.is_reverse() && closer_than(ctx.sensors.rear_distance_cm, self.threshold_cm) {
            SafetyVerdict::BlockedRear
        } else {
            SafetyVerdict::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensors(front: Option<f32>, rear: Option<f32>, infrared: [bool; 3]) -> SensorSnapshot {
        SensorSnapshot {
            front_distance_cm: front,
            rear_distance_cm: rear,
            infrared,
        }
    }

    fn eval(level: AutonomyLevel, snap: &SensorSnapshot, x: f32, y: f32) -> SafetyVerdict {
        SafetyMonitor::standard(15.0).evaluate(DriveRequest::new(x, y), &SafetyContext::new(level, snap))
    }

    // ------------------------------------------------------------------ cliff

    #[test]
    fn cliff_blocks_forward_on_any_channel_at_every_level() {
        for level in AutonomyLevel::ALL {
            for i in 0..3 {
                let mut ir = [false; 3];
                ir[i] = true;
                let snap = sensors(None, None, ir);
                assert_eq!(eval(level, &snap, 0.0, 0.5), SafetyVerdict::BlockedCliff);
            }
        }
    }

    #[test]
    fn cliff_blocks_turn_in_place_but_not_reverse() {
        let snap = sensors(None, None, [false, true, false]);
        assert_eq!(eval(AutonomyLevel::Manual, &snap, 0.6, 0.0), SafetyVerdict::BlockedCliff);
        assert_eq!(eval(AutonomyLevel::Manual, &snap, 0.0, -0.5), SafetyVerdict::Allow);
        assert_eq!(eval(AutonomyLevel::Manual, &snap, 0.4, -0.5), SafetyVerdict::Allow);
    }

    #[test]
    fn stop_request_is_never_vetoed() {
        let snap = sensors(Some(1.0), Some(1.0), [true; 3]);
        assert_eq!(eval(AutonomyLevel::FullAuto, &snap, 0.0, 0.0), SafetyVerdict::Allow);
    }

    #[test]
    fn line_following_tolerates_line_patterns() {
        let monitor = SafetyMonitor::standard(15.0);
        for ir in [
            [false, true, false],
            [true, false, false],
            [false, false, true],
            [true, true, false],
            [false, true, true],
        ] {
            let snap = sensors(None, None, ir);
            let ctx = SafetyContext::new(AutonomyLevel::Manual, &snap)
                .with_profile(DriveProfile::LineFollowing);
            let verdict = monitor.evaluate(DriveRequest::new(0.0, 0.4), &ctx);
            assert_eq!(verdict, SafetyVerdict::Allow, "{ir:?}");
        }
    }

    #[test]
    fn line_following_still_blocks_both_outer_channels() {
        let monitor = SafetyMonitor::standard(15.0);
        for ir in [[true, false, true], [true, true, true]] {
            let snap = sensors(None, None, ir);
            let ctx = SafetyContext::new(AutonomyLevel::Manual, &snap)
                .with_profile(DriveProfile::LineFollowing);
            assert_eq!(
                monitor.evaluate(DriveRequest::new(0.0, 0.4), &ctx),
                SafetyVerdict::BlockedCliff
            );
            assert_eq!(
                monitor.evaluate(DriveRequest::new(0.6, 0.0), &ctx),
                SafetyVerdict::BlockedCliff
            );
            assert!(monitor.evaluate(DriveRequest::new(0.0, -0.4), &ctx).is_allowed());
        }
    }

    #[test]
    fn docking_lowers_front_threshold_only() {
        let snap = sensors(Some(10.0), Some(10.0), [false; 3]);
        let monitor = SafetyMonitor::standard(15.0);
        let ctx = SafetyContext::new(AutonomyLevel::FullAuto, &snap)
            .with_profile(DriveProfile::Docking);
        assert_eq!(monitor.evaluate(DriveRequest::new(0.0, 0.25), &ctx), SafetyVerdict::Allow);
        assert_eq!(monitor.evaluate(DriveRequest::new(0.0, -0.25), &ctx), SafetyVerdict::BlockedRear);

        let snap = sensors(Some(4.0), None, [false; 3]);
        let ctx = SafetyContext::new(AutonomyLevel::FullAuto, &snap)
            .with_profile(DriveProfile::Docking);
        assert_eq!(monitor.evaluate(DriveRequest::new(0.0, 0.25), &ctx), SafetyVerdict::BlockedFront);
    }

    #[test]
    fn docking_keeps_cliff_rule() {
        let snap = sensors(Some(10.0), None, [false, false, true]);
        let ctx = SafetyContext::new(AutonomyLevel::Manual, &snap)
            .with_profile(DriveProfile::Docking);
        let verdict = SafetyMonitor::standard(15.0).evaluate(DriveRequest::new(0.0, 0.25), &ctx);
        assert_eq!(verdict, SafetyVerdict::BlockedCliff);
    }

    // ------------------------------------------------------------------ proximity

    #[test]
    fn proximity_blocks_forward_in_semi_auto() {
        let snap = sensors(Some(10.0), None, [false; 3]);
        assert_eq!(eval(AutonomyLevel::SemiAuto, &snap, 0.0, 0.5), SafetyVerdict::BlockedFront);
        assert_eq!(eval(AutonomyLevel::SemiAuto, &snap, 0.0, -0.5), SafetyVerdict::Allow);
    }

    #[test]
    fn proximity_blocks_reverse_toward_rear_obstacle() {
        let snap = sensors(None, Some(5.0), [false; 3]);
        assert_eq!(eval(AutonomyLevel::FullAuto, &snap, 0.0, -0.3), SafetyVerdict::BlockedRear);
        assert_eq!(eval(AutonomyLevel::FullAuto, &snap, 0.0, 0.3), SafetyVerdict::Allow);
    }

    #[test]
    fn proximity_is_disarmed_in_manual() {
        let snap = sensors(Some(3.0), Some(3.0), [false; 3]);
        assert_eq!(eval(AutonomyLevel::Manual, &snap, 0.0, 0.5), SafetyVerdict::Allow);
    }

    #[test]
    fn proximity_threshold_is_strict() {
        let snap = sensors(Some(15.0), None, [false; 3]);
        assert_eq!(eval(AutonomyLevel::SemiAuto, &snap, 0.0, 0.5), SafetyVerdict::Allow);
    }

    #[test]
    fn unknown_distance_never_blocks() {
        let snap = sensors(None, None, [false; 3]);
        assert_eq!(eval(AutonomyLevel::FullAuto, &snap, 0.0, 1.0), SafetyVerdict::Allow);
        assert_eq!(eval(AutonomyLevel::FullAuto, &snap, 0.0, -1.0), SafetyVerdict::Allow);
    }

    #[test]
    fn cliff_takes_precedence_over_proximity() {
        let snap = sensors(Some(2.0), None, [true, false, false]);
        let monitor = SafetyMonitor::standard(15.0);
        let ctx = SafetyContext::new(AutonomyLevel::SemiAuto, &snap);
        let (rule, verdict) = monitor.first_veto(DriveRequest::new(0.0, 0.5), &ctx).unwrap();
        assert_eq!(rule, "cliff");
        assert_eq!(verdict, SafetyVerdict::BlockedCliff);
    }

    #[test]
    fn empty_monitor_allows_everything() {
        let snap = sensors(Some(1.0), None, [true; 3]);
        let ctx = SafetyContext::new(AutonomyLevel::FullAuto, &snap);
        assert!(SafetyMonitor::new().evaluate(DriveRequest::new(0.0, 1.0), &ctx).is_allowed());
    }

    #[test]
    fn cliff_reports_as_front_block() {
        assert_eq!(SafetyVerdict::BlockedCliff.blocked_status(), Some(RobotStatus::BlockedFront));
        assert_eq!(SafetyVerdict::BlockedRear.blocked_status(), Some(RobotStatus::BlockedRear));
        assert_eq!(SafetyVerdict::Allow.blocked_status(), None);
    }
}
