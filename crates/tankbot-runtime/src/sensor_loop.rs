//! Periodic sensor polling and status push.
//!
//! Two cadences share one task: every `sensor_poll` the ultrasonic, infrared
//! and battery readers are sampled into the state store, and every
//! `status_interval` the current snapshot is pushed to observers whether or
//! not anything changed.

use std::sync::Arc;

use tankbot_types::SensorSnapshot;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::robot::Shared;

/// Read every sensor once and store the result.  Failed reads become
/// "unknown" rather than errors.
pub(crate) fn poll_once(shared: &Shared) {
    let distances = shared.hw.read_distances().unwrap_or_else(|e| {
        warn!(error = %e, "ultrasonic read failed");
        Default::default()
    });
    let infrared = shared.hw.read_infrared().unwrap_or_else(|e| {
        warn!(error = %e, "infrared read failed");
        [false; 3]
    });
    let battery = shared
        .hw
        .read_battery()
        .map_err(|e| debug!(error = %e, "battery read failed"))
        .ok();

    shared.store.refresh_sensors(
        SensorSnapshot {
            front_distance_cm: distances.front,
            rear_distance_cm: distances.rear,
            infrared,
        },
        battery,
    );
}

pub(crate) async fn run_sensor_loop(shared: Arc<Shared>, token: CancellationToken) {
    let mut poll = interval(shared.config.sensor_poll());
    let mut push = interval(shared.config.status_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    push.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(poll = ?shared.config.sensor_poll(), push = ?shared.config.status_interval(), "sensor loop running");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = poll.tick() => poll_once(&shared),
            _ = push.tick() => {
                shared.store.broadcast();
            }
        }
    }
    info!("sensor loop stopped");
}
