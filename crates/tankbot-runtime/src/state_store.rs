//! [`StateStore`] – the single owner of [`RobotState`].
//!
//! Readers get a copy; writers go through [`StateStore::mutate`], which
//! applies the change and publishes the resulting snapshot while still
//! holding the lock, so observers see snapshots in mutation order and never
//! a half-applied update.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tankbot_middleware::StatusBus;
use tankbot_types::{RobotState, SensorSnapshot};

const SOURCE: &str = "tankbot-runtime::state_store";

pub struct StateStore {
    state: Mutex<RobotState>,
    bus: StatusBus,
}

impl StateStore {
    pub fn new(bus: StatusBus) -> Self {
        Self {
            state: Mutex::new(RobotState::default()),
            bus,
        }
    }

    pub fn bus(&self) -> &StatusBus {
        &self.bus
    }

    pub fn read(&self) -> RobotState {
        self.lock().clone()
    }

    /// Apply `f` atomically and publish the new snapshot.
    pub fn mutate<F>(&self, f: F) -> RobotState
    where
        F: FnOnce(&mut RobotState),
    {
        let mut state = self.lock();
        f(&mut state);
        let snapshot = state.clone();
        self.bus.publish_status(SOURCE, snapshot.clone());
        snapshot
    }

    /// Store fresh sensor readings without notifying observers; the sensor
    /// loop pushes on its own cadence.  `battery` of `None` keeps the last
    /// known level.
    pub fn refresh_sensors(&self, sensors: SensorSnapshot, battery: Option<f32>) {
        let mut state = self.lock();
        state.sensors = sensors;
        if let Some(level) = battery {
            state.battery = level.clamp(0.0, 100.0);
        }
    }

    /// Publish the current snapshot.
    pub fn broadcast(&self) -> usize {
        let state = self.lock();
        self.bus.publish_status(SOURCE, state.clone())
    }

    fn lock(&self) -> MutexGuard<'_, RobotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
