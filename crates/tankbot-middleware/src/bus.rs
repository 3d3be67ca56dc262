//! Topic-based publish/subscribe status bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message and no subscriber can block the
//! publisher.  A subscriber that falls behind loses the oldest events and
//! sees a `Lagged` error on its next receive.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Status`] | Full [`RobotState`] snapshots after every mutation and at the periodic push |
//! | [`Topic::Alerts`] | Safety vetoes, behavior faults, emergency stops |

use tankbot_types::{Alert, Event, EventPayload, RobotState};
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// State snapshots.
    Status,
    /// Out-of-band notifications.
    Alerts,
}

/// Shared status bus. Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct StatusBus {
    status: broadcast::Sender<Event>,
    alerts: broadcast::Sender<Event>,
}

impl StatusBus {
    /// Create a new bus with the given per-topic channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (status, _) = broadcast::channel(capacity);
        let (alerts, _) = broadcast::channel(capacity);
        Self { status, alerts }
    }

    /// Publish `event` to `topic`.
    ///
    /// Returns the number of subscribers handed the event; `0` when nobody is
    /// listening, which is a normal condition.
    pub fn publish_to(&self, topic: Topic, event: Event) -> usize {
        match self.topic_sender(topic).send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(_)) => {
                trace!(?topic, "no subscribers");
                0
            }
        }
    }

    /// Publish a state snapshot on [`Topic::Status`].
    pub fn publish_status(&self, source: &str, state: RobotState) -> usize {
        self.publish_to(Topic::Status, Event::new(source, EventPayload::Status(state)))
    }

    /// Publish an alert on [`Topic::Alerts`].
    pub fn publish_alert(&self, source: &str, alert: Alert) -> usize {
        self.publish_to(Topic::Alerts, Event::new(source, EventPayload::Alert(alert)))
    }

    /// Subscribe to a single [`Topic`].
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Status => &self.status,
            Topic::Alerts => &self.alerts,
        }
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`StatusBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive; `None` when nothing is queued.  Lagged events
    /// are skipped.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
