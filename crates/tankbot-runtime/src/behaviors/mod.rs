//! Autonomous behaviors.
//!
//! Each behavior is an async loop driven through a [`BehaviorCtx`].  Every
//! sleep goes through [`BehaviorCtx::pause`], which doubles as the
//! cancellation point: once the supervisor cancels the token, the next pause
//! returns [`BehaviorExit::Cancelled`] and `?` unwinds straight to the single
//! cleanup path in [`run_behavior`].
//!
//! | Behavior | Cadence | LED indicator | Drive profile |
//! |---|---|---|---|
//! | [`obstacle_avoid`] | 100 ms | chaser, cyan | standard |
//! | [`line_track`] | 50 ms | static, green | line following |
//! | [`face_track`] | 100 ms | breath, blue | standard |
//! | [`pickup`] | 100 ms approach, 15 ms servo steps | blink, amber | docking |

pub(crate) mod face_track;
pub(crate) mod line_track;
pub(crate) mod obstacle_avoid;
pub(crate) mod pickup;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tankbot_hal::{CameraFrame, servos::clamp_angle};
use tankbot_kernel::{DriveProfile, SafetyVerdict};
use tankbot_types::{
    Alert, BehaviorKind, CameraId, Detection, LedMode, Rgb, RobotStatus, SensorSnapshot, ServoId,
    TankError,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::robot::Shared;

const SOURCE: &str = "tankbot-runtime::behaviors";

/// Degrees per servo ramp step.
pub(crate) const SERVO_STEP_DEG: f32 = 2.0;
/// Delay between servo ramp steps.
pub(crate) const SERVO_STEP_DELAY: Duration = Duration::from_millis(15);

/// Why a behavior loop stopped early.
#[derive(Debug)]
pub(crate) enum BehaviorExit {
    Cancelled,
    Fault(TankError),
}

impl From<TankError> for BehaviorExit {
    fn from(e: TankError) -> Self {
        BehaviorExit::Fault(e)
    }
}

pub(crate) type Step<T = ()> = Result<T, BehaviorExit>;

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorCtx
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct BehaviorCtx {
    shared: Arc<Shared>,
    token: CancellationToken,
}

impl BehaviorCtx {
    pub(crate) fn new(shared: Arc<Shared>, token: CancellationToken) -> Self {
        Self { shared, token }
    }

    /// Sleep for `period`, or return [`BehaviorExit::Cancelled`] as soon as
    /// the token fires.
    pub(crate) async fn pause(&self, period: Duration) -> Step {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(BehaviorExit::Cancelled),
            _ = tokio::time::sleep(period) => Ok(()),
        }
    }

    /// Latest readings from the state store.
    pub(crate) fn sensors(&self) -> SensorSnapshot {
        self.shared.store.read().sensors
    }

    pub(crate) fn drive(&self, x: f32, y: f32) -> Step<SafetyVerdict> {
        self.drive_as(x, y, DriveProfile::Standard)
    }

    pub(crate) fn drive_as(&self, x: f32, y: f32, profile: DriveProfile) -> Step<SafetyVerdict> {
        Ok(self.shared.drive(x, y, profile)?)
    }

    /// Drive for `period`, then stop.
    pub(crate) async fn drive_for(&self, x: f32, y: f32, period: Duration) -> Step {
        self.drive(x, y)?;
        self.pause(period).await?;
        self.stop()
    }

    pub(crate) fn stop(&self) -> Step {
        Ok(self.shared.hw.stop()?)
    }

    pub(crate) fn set_status(&self, status: RobotStatus) {
        self.shared.set_status(status);
    }

    /// Move `servo` to `target` in [`SERVO_STEP_DEG`] increments.  A servo
    /// whose position is unknown is commanded straight to the target.
    pub(crate) async fn ramp_servo(&self, servo: ServoId, target: f32) -> Step {
        let target = clamp_angle(target);
        let Some(mut angle) = self.shared.hw.servo_angle(servo) else {
            self.shared.hw.set_servo(servo, target)?;
            return self.pause(SERVO_STEP_DELAY).await;
        };
        while angle != target {
            angle = if (target - angle).abs() <= SERVO_STEP_DEG {
                target
            } else {
                angle + SERVO_STEP_DEG.copysign(target - angle)
            };
            self.shared.hw.set_servo(servo, angle)?;
            self.pause(SERVO_STEP_DELAY).await?;
        }
        Ok(())
    }

    pub(crate) fn frame(&self, camera: CameraId) -> Option<CameraFrame> {
        self.shared.hw.latest_frame(camera)
    }

    /// Run the detector on `frame`.  Detector errors count as "nothing seen".
    pub(crate) async fn detect(&self, frame: &CameraFrame) -> Step<Vec<Detection>> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(BehaviorExit::Cancelled),
            result = self.shared.hw.detect(frame) => Ok(result.unwrap_or_else(|e| {
                warn!(error = %e, "detector failed, treating as no detection");
                Vec::new()
            })),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner
// ─────────────────────────────────────────────────────────────────────────────

fn indicator(kind: BehaviorKind) -> (LedMode, Rgb) {
    match kind {
        BehaviorKind::ObstacleAvoid => (LedMode::Chaser, Rgb::new(0, 255, 255)),
        BehaviorKind::LineTrack => (LedMode::Static, Rgb::new(0, 255, 0)),
        BehaviorKind::FaceTrack => (LedMode::Breath, Rgb::new(0, 0, 255)),
        BehaviorKind::Pickup => (LedMode::Blink, Rgb::new(255, 191, 0)),
    }
}

async fn body(kind: BehaviorKind, ctx: &BehaviorCtx) -> Step<RobotStatus> {
    match kind {
        BehaviorKind::ObstacleAvoid => obstacle_avoid::run(ctx).await,
        BehaviorKind::LineTrack => line_track::run(ctx).await,
        BehaviorKind::FaceTrack => face_track::run(ctx).await,
        BehaviorKind::Pickup => pickup::run(ctx).await,
    }
}

/// Task entry point spawned by the supervisor.
///
/// Whatever way the body ends (finished, cancelled, failed or panicked) the
/// motors are stopped, the passive LED indicator is restored and the slot in
/// [`RobotState`][tankbot_types::RobotState] is cleared.
pub(crate) async fn run_behavior(shared: Arc<Shared>, kind: BehaviorKind, token: CancellationToken) {
    let ctx = BehaviorCtx::new(shared.clone(), token);
    let (mode, color) = indicator(kind);
    shared.set_leds(mode, color);

    let outcome = AssertUnwindSafe(body(kind, &ctx)).catch_unwind().await;

    shared.stop_motors();
    let (status, fault) = match outcome {
        Ok(Ok(status)) => (status, None),
        Ok(Err(BehaviorExit::Cancelled)) => (RobotStatus::Standby, None),
        Ok(Err(BehaviorExit::Fault(e))) => (RobotStatus::Error, Some(e.to_string())),
        Err(panic) => (RobotStatus::Error, Some(panic_message(panic.as_ref()))),
    };

    if let Some(details) = fault {
        error!(behavior = %kind, %details, "behavior faulted");
        shared
            .store
            .bus()
            .publish_alert(SOURCE, Alert::BehaviorFault { behavior: kind, details });
    } else {
        info!(behavior = %kind, ?status, "behavior ended");
    }

    shared.passive_leds();
    shared.store.mutate(|s| {
        s.status = status;
        if s.active_behavior == Some(kind) {
            s.active_behavior = None;
        }
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
