//! [`BehaviorSupervisor`] – the exclusive behavior slot.
//!
//! At most one behavior task owns the drive train.  Ownership changes hands
//! only through cancel-then-start: the running task is cancelled through its
//! [`CancellationToken`], awaited for a bounded grace period (it stops the
//! motors itself on the way out), and only then is the next one spawned.
//!
//! | Slot | `start(kind)` |
//! |---|---|
//! | empty or finished | spawn `kind` |
//! | running `kind` | cancel (toggle off) |
//! | running other | cancel, then spawn `kind` |

use std::future::Future;
use std::sync::Arc;

use tankbot_types::{BehaviorKind, RobotStatus};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::behaviors;
use crate::robot::Shared;

struct Running {
    kind: BehaviorKind,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub(crate) struct BehaviorSupervisor {
    shared: Arc<Shared>,
    slot: Option<Running>,
}

impl BehaviorSupervisor {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared, slot: None }
    }

    /// The running behavior; a task that already finished does not count.
    pub(crate) fn active(&self) -> Option<BehaviorKind> {
        self.slot
            .as_ref()
            .filter(|running| !running.handle.is_finished())
            .map(|running| running.kind)
    }

    /// Start `kind`, or toggle it off if it is already running.
    pub(crate) async fn start(&mut self, kind: BehaviorKind) {
        let toggled_off = self.active() == Some(kind);
        self.cancel_all().await;
        if toggled_off {
            info!(behavior = %kind, "behavior toggled off");
        } else {
            self.spawn(kind);
        }
    }

    /// Start `kind` unless it is already running.
    pub(crate) async fn ensure(&mut self, kind: BehaviorKind) {
        if self.active() != Some(kind) {
            self.cancel_all().await;
            self.spawn(kind);
        }
    }

    /// Cancel whatever occupies the slot and wait for it to clean up.
    ///
    /// A task that overruns the grace period is aborted and the supervisor
    /// performs its cleanup instead.
    pub(crate) async fn cancel_all(&mut self) {
        let Some(mut running) = self.slot.take() else {
            return;
        };
        running.token.cancel();

        let grace = self.shared.config.cancel_grace();
        match timeout(grace, &mut running.handle).await {
            Ok(Ok(())) => debug!(behavior = %running.kind, "behavior cancelled"),
            Ok(Err(e)) => {
                warn!(behavior = %running.kind, error = %e, "behavior task failed");
                self.clean_up_after(running.kind);
            }
            Err(_) => {
                warn!(behavior = %running.kind, ?grace, "behavior ignored cancellation, aborting");
                running.handle.abort();
                self.clean_up_after(running.kind);
            }
        }
    }

    fn spawn(&mut self, kind: BehaviorKind) {
        let token = CancellationToken::new();
        let task = behaviors::run_behavior(self.shared.clone(), kind, token.clone());
        self.launch(kind, token, task);
    }

    /// Occupy the slot with `task`, cancelled through `token`.
    fn launch<F>(&mut self, kind: BehaviorKind, token: CancellationToken, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shared.store.mutate(|s| {
            s.active_behavior = Some(kind);
            s.status = kind.status();
        });
        let handle = tokio::spawn(task);
        info!(behavior = %kind, "behavior started");
        self.slot = Some(Running { kind, token, handle });
    }

    fn clean_up_after(&self, kind: BehaviorKind) {
        self.shared.stop_motors();
        self.shared.passive_leds();
        self.shared.store.mutate(|s| {
            if s.active_behavior == Some(kind) {
                s.active_behavior = None;
            }
            s.status = RobotStatus::Standby;
        });
    }
}
