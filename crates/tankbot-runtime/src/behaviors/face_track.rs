//! Turn in place to keep the largest person centered in the front camera.

use std::time::Duration;

use tankbot_types::{CameraId, Detection, RobotStatus};
use tracing::debug;

use super::{BehaviorCtx, Step};

const TICK: Duration = Duration::from_millis(100);
const TARGET_LABEL: &str = "person";
/// Normalized offset below which the target counts as centered.
const DEAD_ZONE: f32 = 0.2;
const TURN_GAIN: f32 = 0.5;
const CLIFF_BACK_UP: Duration = Duration::from_millis(300);
const REVERSE_SPEED: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Aim {
    Lost,
    Centered,
    Turn(f32),
}

/// Steering for the largest `person` detection in a frame `width` pixels
/// wide.
pub(crate) fn aim(detections: &[Detection], width: u32) -> Aim {
    let target = detections
        .iter()
        .filter(|d| d.label == TARGET_LABEL)
        .max_by(|a, b| a.area().total_cmp(&b.area()));
    let Some(target) = target else {
        return Aim::Lost;
    };
    if width == 0 {
        return Aim::Lost;
    }
    let half = width as f32 / 2.0;
    let offset = ((target.center_x() - half) / half).clamp(-1.0, 1.0);
    if offset.abs() < DEAD_ZONE {
        Aim::Centered
    } else {
        Aim::Turn(TURN_GAIN * offset)
    }
}

pub(crate) async fn run(ctx: &BehaviorCtx) -> Step<RobotStatus> {
    loop {
        if ctx.sensors().cliff_detected() {
            debug!("edge detected while tracking, backing up");
            ctx.stop()?;
            ctx.drive_for(0.0, -REVERSE_SPEED, CLIFF_BACK_UP).await?;
            continue;
        }

        let decision = match ctx.frame(CameraId::Front) {
            Some(frame) => aim(&ctx.detect(&frame).await?, frame.width),
            None => Aim::Lost,
        };
        match decision {
            Aim::Turn(x) => {
                ctx.drive(x, 0.0)?;
            }
            Aim::Lost | Aim::Centered => ctx.stop()?,
        }
        ctx.pause(TICK).await?;
    }
}

#[cfg(test)]
mod tests {
    use tankbot_hal::SimRig;
    use tankbot_hal::sim::MotorCommand;
    use tankbot_types::WireCommand;

    use super::*;
    use crate::config::RobotConfig;
    use crate::robot::Robot;

    fn det(label: &str, x1: f32, x2: f32, height: f32) -> Detection {
        Detection {
            label: label.into(),
            confidence: 0.9,
            bbox: [x1, 0.0, x2, height],
        }
    }

    #[test]
    fn aims_at_largest_person() {
        let detections = vec![
            det("person", 0.0, 40.0, 40.0),
            det("person", 520.0, 640.0, 200.0),
            det("cup", 300.0, 340.0, 400.0),
        ];
        // Center 580 in a 640 frame: offset 0.8125.
        match aim(&detections, 640) {
            Aim::Turn(x) => assert!((x - 0.40625).abs() < 1e-6),
            other => panic!("expected a turn, got {other:?}"),
        }
    }

    #[test]
    fn dead_zone_and_lost() {
        assert_eq!(aim(&[det("person", 300.0, 360.0, 50.0)], 640), Aim::Centered);
        assert_eq!(aim(&[det("dog", 0.0, 10.0, 10.0)], 640), Aim::Lost);
        assert_eq!(aim(&[], 640), Aim::Lost);
        assert_eq!(aim(&[det("person", 0.0, 10.0, 10.0)], 0), Aim::Lost);
    }

    #[tokio::test(start_paused = true)]
    async fn turns_toward_person() {
        let rig = SimRig::new();
        let robot = Robot::new(rig.hardware(), RobotConfig::default());
        rig.detector.set(vec![det("person", 0.0, 64.0, 100.0)]);

        robot.execute(&WireCommand::bare("track_face")).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Center 32 in a 640 frame: offset -0.9.
        match rig.motors.last() {
            Some(MotorCommand::Move { x, y }) => {
                assert!((x + 0.45).abs() < 1e-6);
                assert_eq!(y, 0.0);
            }
            other => panic!("expected a turn, got {other:?}"),
        }
        robot.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn holds_still_without_camera() {
        let rig = SimRig::new();
        let robot = Robot::new(rig.hardware(), RobotConfig::default());
        rig.camera.set_online(false);
        rig.detector.set(vec![det("person", 0.0, 64.0, 100.0)]);

        robot.execute(&WireCommand::bare("track_face")).await;
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(rig.motors.commands().iter().all(|c| *c == MotorCommand::Stop));
        robot.shutdown().await;
    }
}
