use std::sync::Arc;

use crate::bus::{BusError, EventConsumer};
use crate::registry::ConnectionRegistry;

/// The single process-wide loop relaying bus events into live connections.
///
/// Exactly one dispatcher runs per process. It pulls events from its
/// consumer-group subscription and fans each one out to the event's room
/// through the registry. Events for rooms with no live members are dropped;
/// there is no buffering or replay, so clients fetch historical state from
/// the store when they join.
pub struct EventDispatcher {
    consumer: EventConsumer,
    registry: Arc<ConnectionRegistry>,
}

impl EventDispatcher {
    pub fn new(consumer: EventConsumer, registry: Arc<ConnectionRegistry>) -> Self {
        Self { consumer, registry }
    }

    /// Run until the bus closes. A read or decode failure ends the loop with
    /// the error; the owning process must treat that as the loss of all
    /// real-time delivery and shut down rather than keep serving without it.
    pub async fn run(mut self) -> Result<(), BusError> {
        loop {
            match self.consumer.next().await {
                Ok(event) => {
                    let delivered = self.registry.broadcast(&event);

                    if delivered == 0 {
                        log::trace!("No live members in room {}, event dropped", event.room_id());
                    }
                }
                Err(BusError::Closed) => {
                    log::info!("Event bus closed, stopping dispatch");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::bus::{EventBus, MemoryBus};
    use crate::events::{DomainEvent, RoomId};
    use crate::registry::OUTBOUND_BUFFER;

    fn song_started(room_id: RoomId) -> DomainEvent {
        DomainEvent::SongStarted {
            room_id,
            user_id: Uuid::new_v4(),
            track_id: "track".to_string(),
            track_name: "Track".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn events_reach_their_room_only() {
        let bus = MemoryBus::new("test-events");
        let registry = Arc::new(ConnectionRegistry::new());

        let dispatcher = EventDispatcher::new(bus.subscribe("dispatch"), registry.clone());
        let running = tokio::spawn(dispatcher.run());

        let room = Uuid::new_v4();
        let other_room = Uuid::new_v4();

        let (member_sender, mut member_receiver) = mpsc::channel(OUTBOUND_BUFFER);
        let (outsider_sender, mut outsider_receiver) = mpsc::channel(OUTBOUND_BUFFER);

        registry.join(room, Uuid::new_v4(), member_sender);
        registry.join(other_room, Uuid::new_v4(), outsider_sender);

        bus.publish(&song_started(room)).await.unwrap();

        let frame = member_receiver.recv().await.unwrap();
        let event: DomainEvent = serde_json::from_str(&frame).unwrap();
        assert!(matches!(event, DomainEvent::SongStarted { .. }));
        assert!(outsider_receiver.try_recv().is_err());

        bus.close();
        assert!(running.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn memberless_rooms_do_not_stop_the_loop() {
        let bus = MemoryBus::new("test-events");
        let registry = Arc::new(ConnectionRegistry::new());

        let dispatcher = EventDispatcher::new(bus.subscribe("dispatch"), registry.clone());
        let running = tokio::spawn(dispatcher.run());

        // Nobody is listening to this room, the event evaporates
        bus.publish(&song_started(Uuid::new_v4())).await.unwrap();

        let room = Uuid::new_v4();
        let (sender, mut receiver) = mpsc::channel(OUTBOUND_BUFFER);
        registry.join(room, Uuid::new_v4(), sender);

        bus.publish(&song_started(room)).await.unwrap();

        // The loop survived the dropped event and still delivers
        let frame = receiver.recv().await.unwrap();
        let event: DomainEvent = serde_json::from_str(&frame).unwrap();
        assert_eq!(event.room_id(), room);

        bus.close();
        assert!(running.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn decode_failures_terminate_the_loop() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let registry = Arc::new(ConnectionRegistry::new());

        let dispatcher = EventDispatcher::new(EventConsumer::new(receiver), registry);
        let running = tokio::spawn(dispatcher.run());

        sender.send("garbage".to_string()).unwrap();

        assert!(matches!(
            running.await.unwrap(),
            Err(BusError::Decode(_))
        ));
    }
}
