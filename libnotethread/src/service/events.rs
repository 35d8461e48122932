//! Progress events for sync, scheduling and connection
//!
//! The bus wraps `tokio::sync::broadcast`: emitters never block, events are
//! dropped when nobody listens, and a lagging subscriber loses the oldest
//! events first. The CLIs subscribe to print progress; tests subscribe to
//! assert the order of state transitions.
//!
//! # Example
//!
//! ```no_run
//! use libnotethread::service::events::{Event, EventBus};
//!
//! # async fn example() {
//! let bus = EventBus::new(64);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(Event::SyncStarted { window_days: 1, notes: 3 });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::types::{ConnectionState, ScheduleState};

pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Err only means there are no receivers
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A sync found modified notes and is about to generate drafts
    SyncStarted { window_days: u32, notes: usize },

    /// A note produced a draft; `fragments` is 0 for a malformed completion
    NoteProcessed { path: PathBuf, fragments: usize },

    /// A note produced no draft
    NoteFailed { path: PathBuf, error: String },

    SyncCompleted { drafts: usize, failures: usize },

    ScheduleStateChanged { index: usize, state: ScheduleState },

    ConnectionStateChanged { state: ConnectionState },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.emit(Event::SyncStarted {
            window_days: 2,
            notes: 5,
        });

        assert_eq!(
            receiver.recv().await.unwrap(),
            Event::SyncStarted {
                window_days: 2,
                notes: 5
            }
        );
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(Event::ConnectionStateChanged {
            state: ConnectionState::AwaitingPin,
        });

        assert_eq!(first.recv().await.unwrap(), second.recv().await.unwrap());
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_no_subscribers_is_fine() {
        let bus = EventBus::new(10);
        bus.emit(Event::SyncCompleted {
            drafts: 0,
            failures: 0,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_serialized_form_is_tagged() {
        let event = Event::ScheduleStateChanged {
            index: 3,
            state: ScheduleState::Scheduled,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "schedule_state_changed");
        assert_eq!(json["index"], 3);
        assert_eq!(json["state"], "scheduled");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_loses_oldest() {
        let bus = EventBus::new(2);
        let mut receiver = bus.subscribe();

        for drafts in 0..4 {
            bus.emit(Event::SyncCompleted {
                drafts,
                failures: 0,
            });
        }

        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(
            receiver.recv().await.unwrap(),
            Event::SyncCompleted {
                drafts: 2,
                failures: 0
            }
        );
    }
}
