use std::sync::Arc;

use auxcord_core::{BusError, DomainEvent, EventBus, ItemId, RoomId, UserId};
use chrono::Utc;
use log::warn;
use rand::Rng;
use thiserror::Error;

use crate::{
    NewQueueItem, NewRoom, NewTrack, QueueItem, QueueStore, Room, RoomCache, StoreError,
};

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;

/// How many times room creation retries a colliding code before giving up
const CODE_ATTEMPTS: usize = 3;

/// Coordinates the store, cache, and bus into the room operations
/// exposed to users.
///
/// Every state change goes through here, so the ordering contract holds:
/// the durable write happens first, and only a successful write publishes
/// an event.
pub struct RoomService<S, B, C> {
    store: Arc<S>,
    bus: Arc<B>,
    cache: Arc<C>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("a vote value must be +1 or -1, got {0}")]
    InvalidVoteValue(i32),
    #[error("queue item does not belong to this room")]
    ItemNotInRoom,
    #[error("room is not active")]
    RoomNotActive,
    #[error("only the host can do this")]
    NotRoomHost,
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The write succeeded but the event never left the process.
    /// Callers must treat the operation as possibly applied and re-fetch
    #[error("event publish failed after the write: {0}")]
    Publish(BusError),
}

impl<S, B, C> RoomService<S, B, C>
where
    S: QueueStore,
    B: EventBus,
    C: RoomCache,
{
    pub fn new(store: Arc<S>, bus: Arc<B>, cache: Arc<C>) -> Self {
        Self { store, bus, cache }
    }

    /// Creates a room with a fresh shareable code, retrying a bounded number
    /// of times if the generated code is already taken
    pub async fn create_room(&self, host_id: UserId, name: String) -> Result<Room, ServiceError> {
        let mut attempts = CODE_ATTEMPTS;

        loop {
            let new_room = NewRoom {
                code: generate_room_code(),
                host_id,
                name: name.clone(),
            };

            match self.store.create_room(new_room).await {
                Ok(room) => {
                    self.cache_room(&room).await;
                    return Ok(room);
                }
                Err(StoreError::Conflict { .. }) if attempts > 1 => attempts -= 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Fetches a room by id, going through the cache.
    ///
    /// Cache failures are logged and fall through to the store, so a broken
    /// cache never takes room lookups down with it.
    pub async fn room(&self, room_id: RoomId) -> Result<Room, ServiceError> {
        match self.cache.room(room_id).await {
            Ok(Some(room)) => return Ok(room),
            Ok(None) => {}
            Err(e) => warn!("Room cache read failed: {e}"),
        }

        let room = self.store.room_by_id(room_id).await?;
        self.cache_room(&room).await;

        Ok(room)
    }

    /// Fetches a room by its shareable code
    pub async fn room_by_code(&self, code: &str) -> Result<Room, ServiceError> {
        let room = self.store.room_by_code(code).await?;
        self.cache_room(&room).await;

        Ok(room)
    }

    /// Resolves the room a user is about to join live. Inactive rooms
    /// refuse new joins
    pub async fn join_room(&self, room_id: RoomId) -> Result<Room, ServiceError> {
        let room = self.room(room_id).await?;

        if !room.active {
            return Err(ServiceError::RoomNotActive);
        }

        Ok(room)
    }

    /// Deactivates a room. Only the host can do this
    pub async fn deactivate_room(
        &self,
        room_id: RoomId,
        requester: UserId,
    ) -> Result<Room, ServiceError> {
        let room = self.room(room_id).await?;

        if room.host_id != requester {
            return Err(ServiceError::NotRoomHost);
        }

        let room = self.store.deactivate_room(room_id).await?;
        self.cache_room(&room).await;

        Ok(room)
    }

    /// Adds a track to the end of a room's queue and announces it
    pub async fn add_to_queue(
        &self,
        room_id: RoomId,
        user_id: UserId,
        track: NewTrack,
    ) -> Result<QueueItem, ServiceError> {
        self.room(room_id).await?;

        let position = self.store.unplayed_items(room_id).await?.len() as i32;

        let item = self
            .store
            .add_queue_item(NewQueueItem {
                room_id,
                user_id,
                track_id: track.track_id,
                track_name: track.track_name,
                artist: track.artist,
                position,
            })
            .await?;

        self.publish(DomainEvent::SongAdded {
            room_id,
            user_id,
            item_id: item.id,
            track_id: item.track_id.clone(),
            track_name: item.track_name.clone(),
            artist: item.artist.clone(),
            timestamp: Utc::now(),
        })
        .await?;

        Ok(item)
    }

    /// Applies a user's vote and refreshes the item's authoritative tally.
    ///
    /// The aggregate is always recomputed from every current vote row,
    /// never adjusted in place, so repeat votes by the same user replace
    /// their earlier value instead of stacking.
    pub async fn cast_vote(
        &self,
        room_id: RoomId,
        item_id: ItemId,
        user_id: UserId,
        value: i32,
    ) -> Result<QueueItem, ServiceError> {
        if value != 1 && value != -1 {
            return Err(ServiceError::InvalidVoteValue(value));
        }

        let mut item = self.store.queue_item_by_id(item_id).await?;

        if item.room_id != room_id {
            return Err(ServiceError::ItemNotInRoom);
        }

        self.store.upsert_vote(item_id, user_id, value).await?;

        let total = self.store.vote_sum(item_id).await?;
        self.store.set_item_votes(item_id, total).await?;
        item.votes = total;

        self.publish(DomainEvent::VoteUpdate {
            room_id,
            item_id,
            total_votes: total,
            timestamp: Utc::now(),
        })
        .await?;

        self.publish(DomainEvent::SongVoted {
            room_id,
            user_id,
            item_id,
            value,
            timestamp: Utc::now(),
        })
        .await?;

        Ok(item)
    }

    /// All unplayed items in a room, best first. An unknown room is
    /// indistinguishable from an empty one
    pub async fn queue(&self, room_id: RoomId) -> Result<Vec<QueueItem>, ServiceError> {
        Ok(self.store.unplayed_items(room_id).await?)
    }

    /// The item that should play next, or `None` when the queue is empty
    pub async fn next_song(&self, room_id: RoomId) -> Result<Option<QueueItem>, ServiceError> {
        Ok(self.store.next_unplayed_item(room_id).await?)
    }

    /// Announces that a user started playback of a queued item
    pub async fn announce_start(
        &self,
        room_id: RoomId,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<(), ServiceError> {
        let item = self.store.queue_item_by_id(item_id).await?;

        if item.room_id != room_id {
            return Err(ServiceError::ItemNotInRoom);
        }

        self.publish(DomainEvent::SongStarted {
            room_id,
            user_id,
            track_id: item.track_id,
            track_name: item.track_name,
            timestamp: Utc::now(),
        })
        .await
    }

    async fn publish(&self, event: DomainEvent) -> Result<(), ServiceError> {
        self.bus.publish(&event).await.map_err(ServiceError::Publish)
    }

    async fn cache_room(&self, room: &Room) {
        if let Err(e) = self.cache.insert(room.clone()).await {
            warn!("Room cache write failed: {e}");
        }
    }
}

fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();

    (0..CODE_LENGTH)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod test {
    use auxcord_core::MemoryBus;
    use uuid::Uuid;

    use super::*;
    use crate::{MemoryCache, MemoryStore};

    fn service() -> RoomService<MemoryStore, MemoryBus, MemoryCache> {
        RoomService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBus::new("test-events")),
            Arc::new(MemoryCache::with_default_ttl()),
        )
    }

    #[tokio::test]
    async fn room_codes_are_six_uppercase_alphanumerics() {
        let service = service();

        let room = service
            .create_room(Uuid::new_v4(), "Party".to_string())
            .await
            .unwrap();

        assert_eq!(room.code.len(), 6);
        assert!(room
            .code
            .bytes()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn out_of_range_votes_are_rejected_before_any_side_effect() {
        let service = service();
        let host = Uuid::new_v4();

        let room = service.create_room(host, "Party".to_string()).await.unwrap();
        let item = service
            .add_to_queue(
                room.id,
                host,
                NewTrack {
                    track_id: "t1".to_string(),
                    track_name: "One".to_string(),
                    artist: "A".to_string(),
                },
            )
            .await
            .unwrap();

        for value in [0, 2, -2, 100] {
            let result = service.cast_vote(room.id, item.id, host, value).await;
            assert!(matches!(result, Err(ServiceError::InvalidVoteValue(_))));
        }

        let queue = service.queue(room.id).await.unwrap();
        assert_eq!(queue[0].votes, 0);
    }

    #[tokio::test]
    async fn votes_on_items_from_another_room_are_refused() {
        let service = service();
        let host = Uuid::new_v4();

        let room = service.create_room(host, "Party".to_string()).await.unwrap();
        let other = service.create_room(host, "Other".to_string()).await.unwrap();
        let item = service
            .add_to_queue(
                other.id,
                host,
                NewTrack {
                    track_id: "t1".to_string(),
                    track_name: "One".to_string(),
                    artist: "A".to_string(),
                },
            )
            .await
            .unwrap();

        let result = service.cast_vote(room.id, item.id, host, 1).await;
        assert!(matches!(result, Err(ServiceError::ItemNotInRoom)));
    }

    #[tokio::test]
    async fn only_the_host_can_deactivate() {
        let service = service();
        let host = Uuid::new_v4();

        let room = service.create_room(host, "Party".to_string()).await.unwrap();

        let result = service.deactivate_room(room.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(ServiceError::NotRoomHost)));

        let room = service.deactivate_room(room.id, host).await.unwrap();
        assert!(!room.active);
    }

    #[tokio::test]
    async fn deactivated_rooms_refuse_joins() {
        let service = service();
        let host = Uuid::new_v4();

        let room = service.create_room(host, "Party".to_string()).await.unwrap();
        service.deactivate_room(room.id, host).await.unwrap();

        let result = service.join_room(room.id).await;
        assert!(matches!(result, Err(ServiceError::RoomNotActive)));
    }
}
