//! `tankbot-middleware` – Status Notifier
//!
//! Fans state snapshots and alerts out to any number of observers (the
//! WebSocket cockpit, logs, tests) without letting a slow observer stall the
//! orchestration core.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe [`StatusBus`] built on Tokio
//!   broadcast channels.

pub mod bus;

pub use bus::{StatusBus, Topic, TopicReceiver};
