use chrono::{DateTime, Utc};
use core_types::Mode;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    ModeChanged {
        mode: Mode,
        generation: u64,
        started_at: DateTime<Utc>,
    },
    /// Emitted once per mode generation, the first time a reading observes
    /// the last sample under the clamping policy.
    Completed {
        mode: Mode,
        generation: u64,
        total: usize,
    },
}

/// Fan-out of replay state changes to live subscribers.
#[derive(Clone)]
pub struct ReplayBus {
    tx: broadcast::Sender<ReplayEvent>,
}

impl ReplayBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self { tx }
    }

    /// Returns how many subscribers received the event. Having none is normal.
    pub fn publish(&self, event: ReplayEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ReplayBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = ReplayBus::new(8);
        assert_eq!(bus.publish(ReplayEvent::Completed { mode: Mode::Manual, generation: 0, total: 3 }), 0);

        let mut rx = bus.subscribe();
        let event = ReplayEvent::ModeChanged {
            mode: Mode::Automated,
            generation: 1,
            started_at: Utc::now(),
        };
        assert_eq!(bus.publish(event.clone()), 1);
        assert_eq!(rx.recv().await.expect("recv"), event);
    }

    #[test]
    fn events_serialize_with_tag() {
        let raw = serde_json::to_value(ReplayEvent::Completed {
            mode: Mode::Manual,
            generation: 2,
            total: 10,
        })
        .expect("encode");
        assert_eq!(raw["event"], "completed");
        assert_eq!(raw["mode"], "manual");
    }
}
