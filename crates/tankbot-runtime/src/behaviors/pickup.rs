//! Approach an object in front of the claw, grab it and lift it; plus the
//! one-shot drop sequence.
//!
//! The approach holds the object at 7.5–8.5 cm using the front ultrasonic
//! reading:
//!
//! | front distance | action |
//! |---|---|
//! | `< 5` | back fast (−0.5) |
//! | `[5, 7.5)` | back slow (−0.25) |
//! | `[7.5, 8.5]` | in position |
//! | `(8.5, 15)` | forward slow (0.25) |
//! | `≥ 15` | forward (0.45) |
//! | unknown | hold still |

use std::time::Duration;

use tankbot_kernel::DriveProfile;
use tankbot_types::{RobotStatus, ServoId};
use tracing::{debug, info, warn};

use super::{BehaviorCtx, Step};

const TICK: Duration = Duration::from_millis(100);

pub(crate) const LIFT_UP: f32 = 140.0;
pub(crate) const LIFT_DOWN: f32 = 40.0;
pub(crate) const CLAW_OPEN: f32 = 150.0;
pub(crate) const CLAW_CLOSED: f32 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Approach {
    Hold,
    InPosition,
    Drive(f32),
}

pub(crate) fn approach_step(front_cm: Option<f32>) -> Approach {
    let Some(d) = front_cm else {
        return Approach::Hold;
    };
    if d < 5.0 {
        Approach::Drive(-0.5)
    } else if d < 7.5 {
        Approach::Drive(-0.25)
    } else if d <= 8.5 {
        Approach::InPosition
    } else if d < 15.0 {
        Approach::Drive(0.25)
    } else {
        Approach::Drive(0.45)
    }
}

pub(crate) async fn run(ctx: &BehaviorCtx) -> Step<RobotStatus> {
    loop {
        let sensors = ctx.sensors();
        if sensors.cliff_detected() {
            warn!("edge detected during approach, aborting pickup");
            ctx.stop()?;
            return Ok(RobotStatus::Standby);
        }
        match approach_step(sensors.front_distance_cm) {
            Approach::InPosition => break,
            Approach::Hold => ctx.stop()?,
            Approach::Drive(y) => {
                ctx.drive_as(0.0, y, DriveProfile::Docking)?;
            }
        }
        debug!(front = ?sensors.front_distance_cm, "approaching");
        ctx.pause(TICK).await?;
    }

    ctx.stop()?;
    ctx.set_status(RobotStatus::PickupLifting);
    info!("in position, lifting");
    ctx.ramp_servo(ServoId::Claw, CLAW_OPEN).await?;
    ctx.ramp_servo(ServoId::ArmLift, LIFT_DOWN).await?;
    ctx.ramp_servo(ServoId::Claw, CLAW_CLOSED).await?;
    ctx.ramp_servo(ServoId::ArmLift, LIFT_UP).await?;
    Ok(RobotStatus::Holding)
}

/// Lower, release, raise. The caller sets the final status.
pub(crate) async fn drop_sequence(ctx: &BehaviorCtx) -> Step {
    ctx.set_status(RobotStatus::Dropping);
    ctx.ramp_servo(ServoId::ArmLift, LIFT_DOWN).await?;
    ctx.ramp_servo(ServoId::Claw, CLAW_OPEN).await?;
    ctx.ramp_servo(ServoId::ArmLift, LIFT_UP).await
}

#[cfg(test)]
mod tests {
    use tankbot_hal::SimRig;
    use tankbot_hal::sim::MotorCommand;
    use tankbot_middleware::Topic;
    use tankbot_types::{BehaviorKind, EventPayload, WireCommand};

    use super::*;
    use crate::config::RobotConfig;
    use crate::robot::Robot;

    #[test]
    fn band_boundaries() {
        assert_eq!(approach_step(None), Approach::Hold);
        assert_eq!(approach_step(Some(4.9)), Approach::Drive(-0.5));
        assert_eq!(approach_step(Some(5.0)), Approach::Drive(-0.25));
        assert_eq!(approach_step(Some(7.4)), Approach::Drive(-0.25));
        assert_eq!(approach_step(Some(7.5)), Approach::InPosition);
        assert_eq!(approach_step(Some(8.5)), Approach::InPosition);
        assert_eq!(approach_step(Some(8.6)), Approach::Drive(0.25));
        assert_eq!(approach_step(Some(14.9)), Approach::Drive(0.25));
        assert_eq!(approach_step(Some(15.0)), Approach::Drive(0.45));
    }

    #[tokio::test(start_paused = true)]
    async fn approaches_then_lifts_and_holds() {
        let rig = SimRig::new();
        let robot = Robot::new(rig.hardware(), RobotConfig::default());
        let mut status = robot.subscribe(Topic::Status);
        robot.set_autonomy_level("semi").await.unwrap();
        robot.start();

        rig.ultrasonic.set(Some(20.0), None);
        tokio::time::sleep(Duration::from_millis(10)).await;
        robot.execute(&WireCommand::bare("pickup")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rig.motors.last(), Some(MotorCommand::Move { x: 0.0, y: 0.45 }));

        rig.ultrasonic.set(Some(10.0), None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rig.motors.last(), Some(MotorCommand::Move { x: 0.0, y: 0.25 }));

        rig.ultrasonic.set(Some(8.0), None);
        tokio::time::sleep(Duration::from_secs(10)).await;

        let state = robot.state();
        assert_eq!(state.status, RobotStatus::Holding);
        assert_eq!(state.active_behavior, None);

        let servos: Vec<ServoId> = rig.servos.writes().iter().map(|(id, _)| *id).collect();
        assert_eq!(servos.first(), Some(&ServoId::Claw));
        assert_eq!(rig.servos.writes_to(ServoId::Claw).last(), Some(&CLAW_CLOSED));
        assert_eq!(rig.servos.writes_to(ServoId::ArmLift).last(), Some(&LIFT_UP));
        let lift = rig.servos.writes_to(ServoId::ArmLift);
        assert!(lift.windows(2).skip(1).all(|w| (w[1] - w[0]).abs() <= 2.0));

        let seen: Vec<_> = std::iter::from_fn(|| status.try_recv())
            .filter_map(|e| match e.payload {
                EventPayload::Status(s) => Some(s.status),
                _ => None,
            })
            .collect();
        let lifting = seen.iter().position(|s| *s == RobotStatus::PickupLifting);
        let approach = seen
            .iter()
            .position(|s| *s == BehaviorKind::Pickup.status());
        assert!(approach < lifting && lifting.is_some());
        robot.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn edge_aborts_approach_to_standby() {
        let rig = SimRig::new();
        let robot = Robot::new(rig.hardware(), RobotConfig::default());
        rig.ultrasonic.set(Some(30.0), None);
        rig.infrared.set([false, true, false]);
        robot.refresh_sensors();

        robot.execute(&WireCommand::bare("pickup")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(robot.state().status, RobotStatus::Standby);
        assert!(rig.servos.writes().is_empty());
    }
}
