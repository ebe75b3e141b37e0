use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::DomainEvent;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("the event bus is closed")]
    Closed,
    #[error("failed to encode event: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode event: {0}")]
    Decode(serde_json::Error),
}

/// The append-only event log connecting state-changing writers to the
/// dispatcher.
///
/// Publishing surfaces local failures (encoding, transport) to the caller
/// immediately but never waits for consumers. Events published for the same
/// room are observed by every consumer group in publish order; there is no
/// ordering across rooms.
#[async_trait]
pub trait EventBus: Send + Sync + 'static {
    /// Append an event to the log.
    async fn publish(&self, event: &DomainEvent) -> Result<(), BusError>;

    /// Register this process's consumer for the given group. Each group
    /// observes the full stream once; subscribing a group a second time
    /// supersedes its previous consumer.
    fn subscribe(&self, group: &str) -> EventConsumer;

    /// Close the log. Pending and future reads on every consumer resolve to
    /// [BusError::Closed] and further publishes are rejected.
    fn close(&self);
}

/// The reading half of a consumer-group subscription.
pub struct EventConsumer {
    receiver: mpsc::UnboundedReceiver<String>,
}

impl EventConsumer {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<String>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event, decoding it into the tagged vocabulary.
    /// Resolves to [BusError::Closed] once the bus shuts down.
    pub async fn next(&mut self) -> Result<DomainEvent, BusError> {
        let payload = self.receiver.recv().await.ok_or(BusError::Closed)?;
        serde_json::from_str(&payload).map_err(BusError::Decode)
    }
}

#[derive(Default)]
struct BusState {
    closed: bool,
    groups: HashMap<String, mpsc::UnboundedSender<String>>,
}

/// In-process [EventBus] for single-node deployments and tests.
///
/// Events are encoded once at publish and fanned out to one channel per
/// consumer group. The fan-out happens under a single lock so all groups see
/// identical per-room interleaving of concurrent publishes.
pub struct MemoryBus {
    topic: String,
    state: Mutex<BusState>,
}

impl MemoryBus {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            state: Default::default(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, event: &DomainEvent) -> Result<(), BusError> {
        let payload = serde_json::to_string(event).map_err(BusError::Encode)?;

        let mut state = self.state.lock();

        if state.closed {
            return Err(BusError::Closed);
        }

        state.groups.retain(|group, sender| {
            let delivered = sender.send(payload.clone()).is_ok();

            if !delivered {
                log::warn!(
                    "Consumer group {} stopped reading topic {}, dropping it",
                    group,
                    self.topic
                );
            }

            delivered
        });

        Ok(())
    }

    fn subscribe(&self, group: &str) -> EventConsumer {
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut state = self.state.lock();

        // A consumer subscribed after close only ever reads Closed
        if !state.closed {
            state.groups.insert(group.to_string(), sender);
        }

        EventConsumer::new(receiver)
    }

    fn close(&self) {
        let mut state = self.state.lock();

        state.closed = true;
        state.groups.clear();
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn vote_update(total_votes: i32) -> DomainEvent {
        DomainEvent::VoteUpdate {
            room_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            total_votes,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn every_group_observes_the_event() {
        let bus = MemoryBus::new("test-events");

        let mut first = bus.subscribe("group-one");
        let mut second = bus.subscribe("group-two");

        let event = vote_update(2);
        bus.publish(&event).await.unwrap();

        assert_eq!(first.next().await.unwrap(), event);
        assert_eq!(second.next().await.unwrap(), event);
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = MemoryBus::new("test-events");
        let mut consumer = bus.subscribe("group");

        for total in 0..4 {
            bus.publish(&vote_update(total)).await.unwrap();
        }

        for total in 0..4 {
            match consumer.next().await.unwrap() {
                DomainEvent::VoteUpdate { total_votes, .. } => {
                    assert_eq!(total_votes, total)
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn close_releases_pending_consumers() {
        let bus = std::sync::Arc::new(MemoryBus::new("test-events"));
        let mut consumer = bus.subscribe("group");

        let pending = tokio::spawn(async move { consumer.next().await });

        bus.close();

        assert!(matches!(pending.await.unwrap(), Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn publish_after_close_is_rejected() {
        let bus = MemoryBus::new("test-events");
        bus.close();

        let result = bus.publish(&vote_update(1)).await;
        assert!(matches!(result, Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn resubscribing_supersedes_the_previous_consumer() {
        let bus = MemoryBus::new("test-events");

        let mut stale = bus.subscribe("group");
        let mut fresh = bus.subscribe("group");

        let event = vote_update(5);
        bus.publish(&event).await.unwrap();

        assert_eq!(fresh.next().await.unwrap(), event);
        assert!(matches!(stale.next().await, Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn undecodable_payloads_surface_as_errors() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut consumer = EventConsumer::new(receiver);

        sender.send("not an event".to_string()).unwrap();

        assert!(matches!(consumer.next().await, Err(BusError::Decode(_))));
    }
}
