//! Follow a dark line with the three downward infrared channels.

use std::time::Duration;

use tankbot_kernel::DriveProfile;
use tankbot_types::RobotStatus;
use tracing::trace;

use super::{BehaviorCtx, Step};

const TICK: Duration = Duration::from_millis(50);

/// Drive command for an infrared pattern `[left, center, right]`, or `None`
/// to stop (line lost, crossing, or ambiguous).
pub(crate) fn steer(infrared: [bool; 3]) -> Option<(f32, f32)> {
    match infrared {
        [false, true, false] => Some((0.0, 0.4)),
        [true, false, false] => Some((0.3, 0.3)),
        [false, false, true] => Some((-0.3, 0.3)),
        [true, true, false] => Some((0.7, 0.0)),
        [false, true, true] => Some((-0.7, 0.0)),
        [true, true, true] | [false, false, false] | [true, false, true] => None,
    }
}

pub(crate) async fn run(ctx: &BehaviorCtx) -> Step<RobotStatus> {
    loop {
        let infrared = ctx.sensors().infrared;
        match steer(infrared) {
            Some((x, y)) => {
                ctx.drive_as(x, y, DriveProfile::LineFollowing)?;
            }
            None => ctx.stop()?,
        }
        trace!(?infrared, "line tick");
        ctx.pause(TICK).await?;
    }
}
