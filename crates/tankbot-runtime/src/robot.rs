//! [`Robot`] – the orchestration core.
//!
//! Owns the state store, the hardware bundle, the safety monitor and the
//! behavior supervisor, and is the only entry point for operator commands.
//!
//! # Command flow
//!
//! ```text
//! WireCommand ─► Command::decode ─► CommandPolicy::check ─► apply
//!                    │ Err                 │ Err               │
//!                    ▼                     ▼                   ▼
//!                 Dropped               Dropped        Applied / Failed
//! ```
//!
//! Commands are serialized by an async lock that also guards the behavior
//! slot.  `emergency_stop` first cancels any running one-shot sequence so it
//! never waits behind a `drop`.
//!
//! Every drive request, from the operator or from a behavior, goes through
//! [`Shared::drive`]: scale by the speed limit, consult the
//! [`SafetyMonitor`], then either move or stop and publish a veto alert.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tankbot_hal::{Hardware, leds::PASSIVE_COLOR};
use tankbot_kernel::{CommandPolicy, DriveProfile, DriveRequest, SafetyContext, SafetyMonitor, SafetyVerdict};
use tankbot_middleware::{StatusBus, Topic, TopicReceiver};
use tankbot_types::{
    Alert, AutonomyLevel, BehaviorKind, Command, LedMode, Rgb, RobotState, RobotStatus, ServoId,
    TankError, WireCommand,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::behaviors::{self, BehaviorCtx, BehaviorExit};
use crate::config::RobotConfig;
use crate::sensor_loop;
use crate::state_store::StateStore;
use crate::supervisor::BehaviorSupervisor;

const SOURCE: &str = "tankbot-runtime::robot";

// ─────────────────────────────────────────────────────────────────────────────
// Shared core
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the dispatcher, the sensor loop and behavior tasks share.
pub(crate) struct Shared {
    pub(crate) store: StateStore,
    pub(crate) hw: Hardware,
    pub(crate) config: RobotConfig,
    safety: SafetyMonitor,
}

impl Shared {
    /// Scale `(x, y)` by the speed limit, run the safety rules and actuate.
    ///
    /// A vetoed request stops the motors and is reported on
    /// [`Topic::Alerts`]; the verdict is returned so callers can map it to a
    /// status.
    pub(crate) fn drive(
        &self,
        x: f32,
        y: f32,
        profile: DriveProfile,
    ) -> Result<SafetyVerdict, TankError> {
        let state = self.store.read();
        let factor = state.speed_factor();
        let request = DriveRequest::new(
            (x * factor).clamp(-1.0, 1.0),
            (y * factor).clamp(-1.0, 1.0),
        );
        let ctx = SafetyContext::new(state.autonomy_level, &state.sensors).with_profile(profile);

        match self.safety.first_veto(request, &ctx) {
            None => {
                self.hw.move_arcade(request.x, request.y)?;
                Ok(SafetyVerdict::Allow)
            }
            Some((rule, verdict)) => {
                warn!(rule, %verdict, x = request.x, y = request.y, "drive vetoed, stopping");
                let alert = Alert::SafetyVeto {
                    rule: rule.to_string(),
                    x: request.x,
                    y: request.y,
                };
                self.hw.stop()?;
                self.store.bus().publish_alert(SOURCE, alert);
                Ok(verdict)
            }
        }
    }

    /// Best-effort stop used on cleanup paths.
    pub(crate) fn stop_motors(&self) {
        if let Err(e) = self.hw.stop() {
            warn!(error = %e, "failed to stop motors");
        }
    }

    pub(crate) fn set_status(&self, status: RobotStatus) {
        self.store.mutate(|s| s.status = status);
    }

    pub(crate) fn set_leds(&self, mode: LedMode, color: Rgb) {
        if let Err(e) = self.hw.set_leds(mode, color) {
            warn!(error = %e, ?mode, "failed to update LEDs");
        }
    }

    pub(crate) fn passive_leds(&self) {
        self.set_leds(LedMode::Static, PASSIVE_COLOR);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DispatchOutcome
// ─────────────────────────────────────────────────────────────────────────────

/// Result of [`Robot::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Applied,
    /// Rejected before anything changed: unknown, malformed or not permitted
    /// at the current autonomy level.
    Dropped(TankError),
    /// Accepted, but a collaborator failed while carrying it out.
    Failed(TankError),
}

impl DispatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DispatchOutcome::Applied)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Robot
// ─────────────────────────────────────────────────────────────────────────────

pub struct Robot {
    shared: Arc<Shared>,
    policy: CommandPolicy,
    commands: tokio::sync::Mutex<BehaviorSupervisor>,
    sensor_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    one_shot: Mutex<CancellationToken>,
}

impl Robot {
    pub fn new(hw: Hardware, config: RobotConfig) -> Self {
        Self::with_bus(hw, config, StatusBus::default())
    }

    /// Build a robot that publishes on an existing bus.
    pub fn with_bus(hw: Hardware, config: RobotConfig, bus: StatusBus) -> Self {
        let shared = Arc::new(Shared {
            store: StateStore::new(bus),
            safety: SafetyMonitor::standard(config.proximity_stop_cm),
            hw,
            config,
        });
        Self {
            commands: tokio::sync::Mutex::new(BehaviorSupervisor::new(shared.clone())),
            shared,
            policy: CommandPolicy::standard(),
            sensor_task: Mutex::new(None),
            one_shot: Mutex::new(CancellationToken::new()),
        }
    }

    /// Replace the standard per-level command policy.
    pub fn with_policy(mut self, policy: CommandPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> RobotState {
        self.shared.store.read()
    }

    pub fn bus(&self) -> &StatusBus {
        self.shared.store.bus()
    }

    pub fn subscribe(&self, topic: Topic) -> TopicReceiver {
        self.bus().subscribe_to(topic)
    }

    pub fn hardware(&self) -> &Hardware {
        &self.shared.hw
    }

    #[cfg(test)]
    pub(crate) fn shared_for_tests(&self) -> Arc<Shared> {
        self.shared.clone()
    }

    /// The behavior currently occupying the slot, if it is still running.
    pub async fn active_behavior(&self) -> Option<BehaviorKind> {
        self.commands.lock().await.active()
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Decode, authorize and apply one operator command.
    pub async fn execute(&self, wire: &WireCommand) -> DispatchOutcome {
        match Command::decode(wire) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                warn!(command = %wire.command, error = %e, "command dropped");
                DispatchOutcome::Dropped(e)
            }
        }
    }

    /// Authorize and apply an already decoded command.
    ///
    /// `emergency_stop` is exempt from the command policy.
    pub async fn dispatch(&self, command: Command) -> DispatchOutcome {
        let emergency = command == Command::EmergencyStop;
        if emergency {
            self.cancel_one_shot();
        }
        let mut supervisor = self.commands.lock().await;

        let level = self.shared.store.read().autonomy_level;
        let permitted = if emergency {
            Ok(())
        } else {
            self.policy.check(level, command.name())
        };
        if let Err(e) = permitted {
            warn!(command = command.name(), %level, "command dropped at this autonomy level");
            return DispatchOutcome::Dropped(e);
        }

        debug!(?command, "applying command");
        match self.apply(&mut supervisor, command).await {
            Ok(()) => DispatchOutcome::Applied,
            Err(e) => {
                warn!(error = %e, "command failed");
                DispatchOutcome::Failed(e)
            }
        }
    }

    async fn apply(
        &self,
        supervisor: &mut BehaviorSupervisor,
        command: Command,
    ) -> Result<(), TankError> {
        let shared = &self.shared;
        match command {
            Command::Move { x, y } => {
                supervisor.cancel_all().await;
                let verdict = shared.drive(x, y, DriveProfile::Standard)?;
                let status = verdict.blocked_status().unwrap_or(if x == 0.0 && y == 0.0 {
                    RobotStatus::Standby
                } else {
                    RobotStatus::Moving
                });
                shared.set_status(status);
            }
            Command::SetSpeed { value } => {
                shared.store.mutate(|s| s.speed_limit_percent = value);
                info!(percent = value, "speed limit updated");
            }
            Command::CameraPan { angle } => shared.hw.set_servo(ServoId::RearCam, angle)?,
            Command::SetZoom { camera, factor } => shared.hw.set_zoom(camera, factor)?,
            Command::ArmControl { joint, value } => {
                supervisor.cancel_all().await;
                shared.set_status(RobotStatus::OperatingArm);
                shared.hw.set_servo(joint.servo(), value)?;
            }
            Command::Pickup => supervisor.start(BehaviorKind::Pickup).await,
            Command::TrackFace => supervisor.start(BehaviorKind::FaceTrack).await,
            Command::LineTracking => supervisor.start(BehaviorKind::LineTrack).await,
            Command::ObstacleAvoidance => supervisor.start(BehaviorKind::ObstacleAvoid).await,
            Command::Drop => {
                supervisor.cancel_all().await;
                self.run_drop().await?;
            }
            Command::SetLed { mode, color } => shared.hw.set_leds(mode, color)?,
            Command::EmergencyStop => self.halt(supervisor, "operator").await,
        }
        Ok(())
    }

    /// One-shot drop sequence, run under the command lock.
    async fn run_drop(&self) -> Result<(), TankError> {
        let token = {
            let mut slot = guard(&self.one_shot);
            *slot = CancellationToken::new();
            slot.clone()
        };
        let ctx = BehaviorCtx::new(self.shared.clone(), token);
        match behaviors::pickup::drop_sequence(&ctx).await {
            Ok(()) => {
                self.shared.set_status(RobotStatus::Standby);
                Ok(())
            }
            // Interrupted by an emergency stop, which restores the state.
            Err(BehaviorExit::Cancelled) => Ok(()),
            Err(BehaviorExit::Fault(e)) => {
                self.shared.stop_motors();
                self.shared.set_status(RobotStatus::Error);
                Err(e)
            }
        }
    }

    fn cancel_one_shot(&self) {
        guard(&self.one_shot).cancel();
    }

    async fn halt(&self, supervisor: &mut BehaviorSupervisor, origin: &str) {
        supervisor.cancel_all().await;
        self.shared.stop_motors();
        self.shared.set_status(RobotStatus::Standby);
        self.bus().publish_alert(
            SOURCE,
            Alert::EmergencyStop {
                origin: origin.to_string(),
            },
        );
        warn!(origin, "emergency stop");
    }

    /// Cancel everything and stop the actuators. Allowed at every level.
    pub async fn emergency_stop(&self, origin: &str) {
        self.cancel_one_shot();
        let mut supervisor = self.commands.lock().await;
        self.halt(&mut supervisor, origin).await;
    }

    // ── Autonomy ─────────────────────────────────────────────────────────────

    /// Switch autonomy level by wire name (`manual`, `semi`, `auto`).
    ///
    /// Entering FULL_AUTO starts obstacle avoidance; leaving it cancels all
    /// behaviors and stops the robot.  Re-selecting the current level does
    /// nothing.
    pub async fn set_autonomy_level(&self, level: &str) -> Result<AutonomyLevel, TankError> {
        let level: AutonomyLevel = level.parse()?;
        let mut supervisor = self.commands.lock().await;

        let previous = self.shared.store.read().autonomy_level;
        if previous == level {
            debug!(%level, "autonomy level unchanged");
            return Ok(level);
        }

        let leaving_full = previous == AutonomyLevel::FullAuto;
        if leaving_full {
            supervisor.cancel_all().await;
            self.shared.stop_motors();
        }
        self.shared.store.mutate(|s| {
            s.autonomy_level = level;
            if leaving_full {
                s.status = RobotStatus::Standby;
            }
        });
        info!(from = %previous, to = %level, "autonomy level changed");

        if level == AutonomyLevel::FullAuto {
            supervisor.ensure(BehaviorKind::ObstacleAvoid).await;
        }
        Ok(level)
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Start the sensor loop. Calling it again while the loop runs is a
    /// no-op.
    pub fn start(&self) {
        let mut task = guard(&self.sensor_task);
        if task.as_ref().is_some_and(|(_, handle)| !handle.is_finished()) {
            return;
        }
        let token = CancellationToken::new();
        let handle = tokio::spawn(sensor_loop::run_sensor_loop(
            self.shared.clone(),
            token.clone(),
        ));
        *task = Some((token, handle));
        info!("robot started");
    }

    /// Poll every sensor once and store the result.
    pub fn refresh_sensors(&self) {
        sensor_loop::poll_once(&self.shared);
    }

    /// Stop behaviors, the sensor loop and the actuators; switch the LEDs off.
    pub async fn shutdown(&self) {
        self.cancel_one_shot();
        let task = guard(&self.sensor_task).take();
        if let Some((token, handle)) = task {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "sensor loop ended abnormally");
            }
        }

        let mut supervisor = self.commands.lock().await;
        supervisor.cancel_all().await;
        self.shared.stop_motors();
        self.shared.set_leds(LedMode::Off, Rgb::new(0, 0, 0));
        self.shared.set_status(RobotStatus::Standby);
        info!("robot shut down");
    }
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tankbot_hal::SimRig;
    use tankbot_hal::sim::MotorCommand;
    use tankbot_types::{ArmJoint, EventPayload};

    use super::*;

    fn robot(rig: &SimRig) -> Robot {
        Robot::new(rig.hardware(), RobotConfig::default())
    }

    /// Let spawned tasks run while the clock is paused.
    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn cmd(name: &str, params: serde_json::Value) -> WireCommand {
        WireCommand::new(name, params)
    }

    #[tokio::test(start_paused = true)]
    async fn manual_move_is_scaled_by_speed_limit() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        assert!(robot.execute(&cmd("set_speed", json!({"value": 50}))).await.is_applied());
        let outcome = robot.execute(&cmd("move", json!({"x": 0.0, "y": 0.8}))).await;

        assert!(outcome.is_applied());
        assert_eq!(rig.motors.last(), Some(MotorCommand::Move { x: 0.0, y: 0.4 }));
        assert_eq!(robot.state().status, RobotStatus::Moving);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_move_at_full_speed() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        robot.execute(&cmd("move", json!({"x": 0.0, "y": 0.4}))).await;
        assert_eq!(rig.motors.last(), Some(MotorCommand::Move { x: 0.0, y: 0.4 }));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_move_reports_standby() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        robot.execute(&cmd("move", json!({"x": 0.5, "y": 0.5}))).await;
        robot.execute(&cmd("move", json!({}))).await;
        assert_eq!(robot.state().status, RobotStatus::Standby);
    }

    #[tokio::test(start_paused = true)]
    async fn set_speed_out_of_range_changes_nothing() {
        let rig = SimRig::new();
        let robot = robot(&rig);
        let before = robot.state();

        let outcome = robot.execute(&cmd("set_speed", json!({"value": 150}))).await;
        assert!(matches!(outcome, DispatchOutcome::Dropped(TankError::InvalidParameter { .. })));

        let outcome = robot.execute(&cmd("set_speed", json!({"value": "fast"}))).await;
        assert!(matches!(outcome, DispatchOutcome::Dropped(_)));
        assert_eq!(robot.state(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_command_is_dropped() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        let outcome = robot.execute(&WireCommand::bare("self_destruct")).await;
        assert!(matches!(outcome, DispatchOutcome::Dropped(TankError::InvalidCommand(_))));
        assert!(rig.motors.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cliff_vetoes_manual_forward_and_alerts() {
        let rig = SimRig::new();
        let robot = robot(&rig);
        let mut alerts = robot.subscribe(Topic::Alerts);

        rig.infrared.set([false, false, true]);
        robot.refresh_sensors();
        robot.execute(&cmd("move", json!({"y": 0.5}))).await;

        assert_eq!(rig.motors.last(), Some(MotorCommand::Stop));
        assert_eq!(robot.state().status, RobotStatus::BlockedFront);
        let event = alerts.try_recv().unwrap();
        assert!(matches!(
            event.payload,
            EventPayload::Alert(Alert::SafetyVeto { ref rule, .. }) if rule == "cliff"
        ));

        robot.execute(&cmd("move", json!({"y": -0.5}))).await;
        assert_eq!(rig.motors.last(), Some(MotorCommand::Move { x: 0.0, y: -0.5 }));
    }

    #[tokio::test(start_paused = true)]
    async fn proximity_blocks_forward_but_allows_reverse_in_semi() {
        let rig = SimRig::new();
        let robot = robot(&rig);
        robot.set_autonomy_level("semi").await.unwrap();

        rig.ultrasonic.set(Some(10.0), None);
        robot.refresh_sensors();

        robot.execute(&cmd("move", json!({"y": 0.5}))).await;
        assert_eq!(rig.motors.last(), Some(MotorCommand::Stop));
        assert_eq!(robot.state().status, RobotStatus::BlockedFront);

        robot.execute(&cmd("move", json!({"y": -0.5}))).await;
        assert_eq!(rig.motors.last(), Some(MotorCommand::Move { x: 0.0, y: -0.5 }));
        assert_eq!(robot.state().status, RobotStatus::Moving);
    }

    #[tokio::test(start_paused = true)]
    async fn proximity_reports_blocked_rear() {
        let rig = SimRig::new();
        let robot = robot(&rig);
        robot.set_autonomy_level("semi").await.unwrap();

        rig.ultrasonic.set(None, Some(5.0));
        robot.refresh_sensors();
        robot.execute(&cmd("move", json!({"y": -0.5}))).await;
        assert_eq!(robot.state().status, RobotStatus::BlockedRear);
    }

    #[tokio::test(start_paused = true)]
    async fn move_is_dropped_in_full_auto() {
        let rig = SimRig::new();
        let robot = robot(&rig);
        robot.set_autonomy_level("auto").await.unwrap();
        settle(50).await;

        let before = robot.state();
        let outcome = robot.execute(&cmd("move", json!({"y": 1.0}))).await;
        assert!(matches!(outcome, DispatchOutcome::Dropped(TankError::CommandNotPermitted { .. })));
        assert_eq!(robot.state().active_behavior, before.active_behavior);
        assert_eq!(robot.active_behavior().await, Some(BehaviorKind::ObstacleAvoid));
    }

    #[tokio::test(start_paused = true)]
    async fn full_auto_starts_and_leaving_cancels_obstacle_avoidance() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        robot.set_autonomy_level("auto").await.unwrap();
        settle(250).await;
        assert_eq!(robot.active_behavior().await, Some(BehaviorKind::ObstacleAvoid));
        assert_eq!(robot.state().status, RobotStatus::ObstacleAvoidance);

        // Same level again must not toggle it off.
        robot.set_autonomy_level("auto").await.unwrap();
        assert_eq!(robot.active_behavior().await, Some(BehaviorKind::ObstacleAvoid));

        robot.set_autonomy_level("manual").await.unwrap();
        let state = robot.state();
        assert_eq!(state.autonomy_level, AutonomyLevel::Manual);
        assert_eq!(state.status, RobotStatus::Standby);
        assert_eq!(state.active_behavior, None);
        assert_eq!(rig.motors.last(), Some(MotorCommand::Stop));

        rig.motors.clear();
        settle(500).await;
        assert!(rig.motors.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_autonomy_level_leaves_state_untouched() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        let err = robot.set_autonomy_level("turbo").await.unwrap_err();
        assert_eq!(err, TankError::InvalidAutonomyLevel("turbo".into()));
        assert_eq!(robot.state().autonomy_level, AutonomyLevel::Manual);
    }

    #[tokio::test(start_paused = true)]
    async fn move_overrides_running_behavior() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        robot.execute(&WireCommand::bare("line_tracking")).await;
        settle(120).await;
        robot.execute(&cmd("move", json!({"x": 0.2, "y": 0.3}))).await;

        assert_eq!(robot.active_behavior().await, None);
        assert_eq!(robot.state().status, RobotStatus::Moving);
        assert_eq!(rig.motors.last(), Some(MotorCommand::Move { x: 0.2, y: 0.3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn arm_control_drives_joint_and_cancels_behavior() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        robot.execute(&WireCommand::bare("obstacle_avoidance")).await;
        settle(50).await;
        let outcome = robot
            .execute(&cmd("arm_control", json!({"joint": "claw", "value": 90})))
            .await;

        assert!(outcome.is_applied());
        assert_eq!(robot.active_behavior().await, None);
        assert_eq!(robot.state().status, RobotStatus::OperatingArm);
        assert_eq!(rig.servos.writes_to(ArmJoint::Claw.servo()), vec![90.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_zoom_and_leds_reach_hardware() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        robot.execute(&cmd("camera_pan", json!({"angle": 45}))).await;
        robot
            .execute(&cmd("set_zoom", json!({"camera": "rear", "factor": 2.5})))
            .await;
        robot
            .execute(&cmd("set_led", json!({"mode": "police", "r": 255})))
            .await;

        assert_eq!(rig.servos.writes_to(ServoId::RearCam), vec![45.0]);
        assert_eq!(rig.camera.zoom(tankbot_types::CameraId::Rear), Some(2.5));
        assert_eq!(rig.leds.last(), Some((LedMode::Police, Rgb::new(255, 0, 0))));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_runs_lower_open_raise_then_standby() {
        let rig = SimRig::new();
        let robot = robot(&rig);
        let mut status = robot.subscribe(Topic::Status);

        let outcome = robot.execute(&WireCommand::bare("drop")).await;
        assert!(outcome.is_applied());
        assert_eq!(robot.state().status, RobotStatus::Standby);

        let seen: Vec<_> = std::iter::from_fn(|| status.try_recv())
            .filter_map(|e| match e.payload {
                EventPayload::Status(s) => Some(s.status),
                _ => None,
            })
            .collect();
        assert!(seen.contains(&RobotStatus::Dropping));

        let servos: Vec<_> = rig.servos.writes().iter().map(|(id, _)| *id).collect();
        assert_eq!(servos.first(), Some(&ServoId::ArmLift));
        assert_eq!(servos.last(), Some(&ServoId::ArmLift));
        assert!(servos.contains(&ServoId::Claw));
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_stop_cancels_behavior_and_alerts() {
        let rig = SimRig::new();
        let robot = robot(&rig);
        let mut alerts = robot.subscribe(Topic::Alerts);

        robot.execute(&WireCommand::bare("track_face")).await;
        settle(150).await;
        assert!(robot.execute(&WireCommand::bare("emergency_stop")).await.is_applied());

        let state = robot.state();
        assert_eq!(state.status, RobotStatus::Standby);
        assert_eq!(state.active_behavior, None);
        assert_eq!(rig.motors.last(), Some(MotorCommand::Stop));
        let alert = std::iter::from_fn(|| alerts.try_recv())
            .find(|e| matches!(e.payload, EventPayload::Alert(Alert::EmergencyStop { .. })));
        assert!(alert.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_stop_is_allowed_in_full_auto() {
        let rig = SimRig::new();
        let robot = robot(&rig);
        robot.set_autonomy_level("auto").await.unwrap();
        settle(50).await;

        robot.emergency_stop("test").await;
        assert_eq!(robot.active_behavior().await, None);
        assert_eq!(robot.state().status, RobotStatus::Standby);
        assert_eq!(robot.state().autonomy_level, AutonomyLevel::FullAuto);
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_shutdown_manage_sensor_loop() {
        let rig = SimRig::new();
        let robot = robot(&rig);

        rig.ultrasonic.set(Some(33.0), Some(44.0));
        robot.start();
        robot.start();
        settle(150).await;
        assert_eq!(robot.state().sensors.front_distance_cm, Some(33.0));

        robot.shutdown().await;
        assert_eq!(rig.leds.last(), Some((LedMode::Off, Rgb::new(0, 0, 0))));
        assert_eq!(rig.motors.last(), Some(MotorCommand::Stop));

        rig.ultrasonic.set(Some(99.0), None);
        settle(300).await;
        assert_eq!(robot.state().sensors.front_distance_cm, Some(33.0));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_policy_can_revoke_commands() {
        let rig = SimRig::new();
        let mut policy = CommandPolicy::standard();
        policy.revoke(AutonomyLevel::Manual, "set_led");
        let robot = Robot::new(rig.hardware(), RobotConfig::default()).with_policy(policy);

        let outcome = robot.execute(&cmd("set_led", json!({"mode": "off"}))).await;
        assert!(matches!(outcome, DispatchOutcome::Dropped(_)));
        assert!(rig.leds.last().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_stop_ignores_revoked_policy() {
        let rig = SimRig::new();
        let mut policy = CommandPolicy::standard();
        for level in AutonomyLevel::ALL {
            policy.revoke(level, "emergency_stop");
        }
        let robot = Robot::new(rig.hardware(), RobotConfig::default()).with_policy(policy);

        robot.execute(&cmd("move", json!({"x": 0.0, "y": 0.5}))).await;
        let outcome = robot.execute(&WireCommand::bare("emergency_stop")).await;

        assert_eq!(outcome, DispatchOutcome::Applied);
        assert_eq!(rig.motors.last(), Some(MotorCommand::Stop));
        assert_eq!(robot.state().status, RobotStatus::Standby);
    }
}
