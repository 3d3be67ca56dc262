//! Wander forward, slow down near obstacles, scan and turn away when blocked.

use std::time::Duration;

use tankbot_types::{RobotStatus, SensorSnapshot};
use tracing::debug;

use super::{BehaviorCtx, Step};

const TICK: Duration = Duration::from_millis(100);

const CRUISE_SPEED: f32 = 0.5;
const SLOW_SPEED: f32 = 0.3;
const TURN_SPEED: f32 = 0.6;
const REVERSE_SPEED: f32 = 0.4;

const SLOW_BELOW_CM: f32 = 40.0;
const STOP_BELOW_CM: f32 = 20.0;
/// A side must offer at least this much room to be chosen.
const SIDE_CLEAR_CM: f32 = 25.0;
const REAR_CLEAR_CM: f32 = 20.0;

const SCAN_QUARTER: Duration = Duration::from_millis(400);
const SCAN_HALF: Duration = Duration::from_millis(800);
const ESCAPE_TURN: Duration = Duration::from_millis(500);
const BACK_UP: Duration = Duration::from_millis(500);
const TURN_AROUND: Duration = Duration::from_millis(1000);
const CLIFF_BACK_UP: Duration = Duration::from_millis(400);
const CLIFF_TURN: Duration = Duration::from_millis(400);

/// Where to go after a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Escape {
    Left,
    Right,
    TurnAround,
}

/// Pick the side with more room, provided it clears [`SIDE_CLEAR_CM`].
/// Unknown readings never qualify.
pub(crate) fn choose_direction(left: Option<f32>, right: Option<f32>) -> Escape {
    let room = |d: Option<f32>| d.filter(|&cm| cm > SIDE_CLEAR_CM);
    match (room(left), room(right)) {
        (Some(l), Some(r)) if l >= r => Escape::Left,
        (Some(_), Some(_)) => Escape::Right,
        (Some(_), None) => Escape::Left,
        (None, Some(_)) => Escape::Right,
        (None, None) => Escape::TurnAround,
    }
}

/// Forward throttle for the current front reading; `None` means stop and scan.
pub(crate) fn cruise_speed(front: Option<f32>) -> Option<f32> {
    match front {
        Some(cm) if cm < STOP_BELOW_CM => None,
        Some(cm) if cm < SLOW_BELOW_CM => Some(SLOW_SPEED),
        Some(_) => Some(CRUISE_SPEED),
        None => Some(SLOW_SPEED),
    }
}

pub(crate) async fn run(ctx: &BehaviorCtx) -> Step<RobotStatus> {
    loop {
        let sensors = ctx.sensors();
        if sensors.cliff_detected() {
            back_off_edge(ctx, &sensors).await?;
            continue;
        }

        match cruise_speed(sensors.front_distance_cm) {
            Some(speed) => {
                ctx.drive(0.0, speed)?;
                ctx.pause(TICK).await?;
            }
            None => {
                ctx.stop()?;
                scan_and_escape(ctx).await?;
            }
        }
    }
}

async fn back_off_edge(ctx: &BehaviorCtx, sensors: &SensorSnapshot) -> Step {
    debug!(infrared = ?sensors.infrared, "edge detected, backing off");
    ctx.stop()?;
    ctx.drive_for(0.0, -REVERSE_SPEED, CLIFF_BACK_UP).await?;
    // Turn away from the side that saw the edge.
    let away = if sensors.infrared[0] { TURN_SPEED } else { -TURN_SPEED };
    ctx.drive_for(away, 0.0, CLIFF_TURN).await
}

async fn scan_and_escape(ctx: &BehaviorCtx) -> Step {
    ctx.drive_for(-TURN_SPEED, 0.0, SCAN_QUARTER).await?;
    let left = ctx.sensors().front_distance_cm;
    ctx.drive_for(TURN_SPEED, 0.0, SCAN_HALF).await?;
    let right = ctx.sensors().front_distance_cm;
    ctx.drive_for(-TURN_SPEED, 0.0, SCAN_QUARTER).await?;

    let escape = choose_direction(left, right);
    debug!(?left, ?right, ?escape, "scan complete");
    match escape {
        Escape::Left => ctx.drive_for(-TURN_SPEED, 0.0, ESCAPE_TURN).await,
        Escape::Right => ctx.drive_for(TURN_SPEED, 0.0, ESCAPE_TURN).await,
        Escape::TurnAround => {
            let rear_clear = ctx
                .sensors()
                .rear_distance_cm
                .is_some_and(|cm| cm >= REAR_CLEAR_CM);
            if rear_clear {
                ctx.drive_for(0.0, -REVERSE_SPEED, BACK_UP).await?;
            }
            ctx.drive_for(TURN_SPEED, 0.0, TURN_AROUND).await
        }
    }
}

#[cfg(test)]
mod tests {
    use tankbot_hal::SimRig;
    use tankbot_hal::sim::MotorCommand;
    use tankbot_types::{BehaviorKind, WireCommand};

    use super::*;
    use crate::config::RobotConfig;
    use crate::robot::Robot;

    #[test]
    fn cruise_speed_bands() {
        assert_eq!(cruise_speed(Some(100.0)), Some(CRUISE_SPEED));
        assert_eq!(cruise_speed(Some(40.0)), Some(CRUISE_SPEED));
        assert_eq!(cruise_speed(Some(39.9)), Some(SLOW_SPEED));
        assert_eq!(cruise_speed(Some(20.0)), Some(SLOW_SPEED));
        assert_eq!(cruise_speed(Some(19.9)), None);
        assert_eq!(cruise_speed(None), Some(SLOW_SPEED));
    }

    #[test]
    fn escape_prefers_roomier_clear_side() {
        assert_eq!(choose_direction(Some(80.0), Some(30.0)), Escape::Left);
        assert_eq!(choose_direction(Some(30.0), Some(80.0)), Escape::Right);
        assert_eq!(choose_direction(Some(10.0), Some(26.0)), Escape::Right);
        assert_eq!(choose_direction(None, Some(50.0)), Escape::Right);
        assert_eq!(choose_direction(Some(25.0), Some(25.0)), Escape::TurnAround);
        assert_eq!(choose_direction(None, None), Escape::TurnAround);
    }

    #[tokio::test(start_paused = true)]
    async fn cruises_then_scans_when_blocked() {
        let rig = SimRig::new();
        let robot = Robot::new(rig.hardware(), RobotConfig::default());
        robot.start();

        rig.ultrasonic.set(Some(100.0), None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        robot.execute(&WireCommand::bare("obstacle_avoidance")).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(rig.motors.last(), Some(MotorCommand::Move { x: 0.0, y: CRUISE_SPEED }));

        rig.ultrasonic.set(Some(10.0), None);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(
            rig.motors
                .commands()
                .contains(&MotorCommand::Move { x: -TURN_SPEED, y: 0.0 }),
            "expected a scan turn"
        );
        assert_eq!(robot.state().status, BehaviorKind::ObstacleAvoid.status());
        robot.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn backs_away_from_edge() {
        let rig = SimRig::new();
        let robot = Robot::new(rig.hardware(), RobotConfig::default());
        rig.infrared.set([true, false, false]);
        robot.refresh_sensors();

        robot.execute(&WireCommand::bare("obstacle_avoidance")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let log = rig.motors.commands();
        assert_eq!(log.first(), Some(&MotorCommand::Stop));
        assert_eq!(log.get(1), Some(&MotorCommand::Move { x: 0.0, y: -REVERSE_SPEED }));
        robot.shutdown().await;
    }
}
