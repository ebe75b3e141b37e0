use std::collections::HashMap;

use async_trait::async_trait;
use auxcord_core::{ItemId, RoomId, UserId};
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{QueueStore, StoreError, StoreResult};
use crate::{NewQueueItem, NewRoom, QueueItem, Room, Vote};

/// A [QueueStore] kept entirely in memory.
///
/// Behaves like [super::PgStore] minus durability, which makes it useful
/// in tests and for running without a database at hand.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    rooms: HashMap<RoomId, Room>,
    items: HashMap<ItemId, QueueItem>,
    votes: HashMap<(ItemId, UserId), Vote>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn unplayed(&self, room_id: RoomId) -> Vec<QueueItem> {
        let mut items: Vec<_> = self
            .items
            .values()
            .filter(|i| i.room_id == room_id && !i.played)
            .cloned()
            .collect();

        items.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then(a.created_at.cmp(&b.created_at))
        });

        items
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn create_room(&self, new_room: NewRoom) -> StoreResult<Room> {
        let mut state = self.state.lock();

        if state.rooms.values().any(|r| r.code == new_room.code) {
            return Err(StoreError::Conflict {
                resource: "room",
                field: "code",
                value: new_room.code,
            });
        }

        let now = Utc::now();
        let room = Room {
            id: Uuid::new_v4(),
            code: new_room.code,
            host_id: new_room.host_id,
            name: new_room.name,
            active: true,
            created_at: now,
            updated_at: now,
        };

        state.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn room_by_id(&self, room_id: RoomId) -> StoreResult<Room> {
        self.state
            .lock()
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                resource: "room",
                identifier: "id",
            })
    }

    async fn room_by_code(&self, code: &str) -> StoreResult<Room> {
        self.state
            .lock()
            .rooms
            .values()
            .find(|r| r.code == code)
            .cloned()
            .ok_or(StoreError::NotFound {
                resource: "room",
                identifier: "code",
            })
    }

    async fn deactivate_room(&self, room_id: RoomId) -> StoreResult<Room> {
        let mut state = self.state.lock();

        let room = state.rooms.get_mut(&room_id).ok_or(StoreError::NotFound {
            resource: "room",
            identifier: "id",
        })?;

        room.active = false;
        room.updated_at = Utc::now();

        Ok(room.clone())
    }

    async fn add_queue_item(&self, new_item: NewQueueItem) -> StoreResult<QueueItem> {
        let now = Utc::now();
        let item = QueueItem {
            id: Uuid::new_v4(),
            room_id: new_item.room_id,
            user_id: new_item.user_id,
            track_id: new_item.track_id,
            track_name: new_item.track_name,
            artist: new_item.artist,
            votes: 0,
            position: new_item.position,
            played: false,
            created_at: now,
            updated_at: now,
        };

        self.state.lock().items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn queue_item_by_id(&self, item_id: ItemId) -> StoreResult<QueueItem> {
        self.state
            .lock()
            .items
            .get(&item_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                resource: "queue item",
                identifier: "id",
            })
    }

    async fn unplayed_items(&self, room_id: RoomId) -> StoreResult<Vec<QueueItem>> {
        Ok(self.state.lock().unplayed(room_id))
    }

    async fn next_unplayed_item(&self, room_id: RoomId) -> StoreResult<Option<QueueItem>> {
        Ok(self.state.lock().unplayed(room_id).into_iter().next())
    }

    async fn mark_played(&self, item_id: ItemId) -> StoreResult<QueueItem> {
        let mut state = self.state.lock();

        let item = state.items.get_mut(&item_id).ok_or(StoreError::NotFound {
            resource: "queue item",
            identifier: "id",
        })?;

        item.played = true;
        item.updated_at = Utc::now();

        Ok(item.clone())
    }

    async fn upsert_vote(&self, item_id: ItemId, user_id: UserId, value: i32) -> StoreResult<Vote> {
        let mut state = self.state.lock();

        let vote = state
            .votes
            .entry((item_id, user_id))
            .and_modify(|v| v.value = value)
            .or_insert_with(|| Vote {
                id: Uuid::new_v4(),
                queue_item_id: item_id,
                user_id,
                value,
                created_at: Utc::now(),
            });

        Ok(vote.clone())
    }

    async fn vote_sum(&self, item_id: ItemId) -> StoreResult<i32> {
        let total = self
            .state
            .lock()
            .votes
            .iter()
            .filter(|((item, _), _)| *item == item_id)
            .map(|(_, v)| v.value)
            .sum();

        Ok(total)
    }

    async fn set_item_votes(&self, item_id: ItemId, votes: i32) -> StoreResult<()> {
        let mut state = self.state.lock();

        let item = state.items.get_mut(&item_id).ok_or(StoreError::NotFound {
            resource: "queue item",
            identifier: "id",
        })?;

        item.votes = votes;
        item.updated_at = Utc::now();

        Ok(())
    }
}
