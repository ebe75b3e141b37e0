mod memory;
mod pg;

use async_trait::async_trait;
use auxcord_core::{ItemId, RoomId, UserId};
use thiserror::Error;

pub use memory::*;
pub use pg::*;

use crate::{NewQueueItem, NewRoom, QueueItem, Room, Vote};

pub type StoreResult<T> = Result<T, StoreError>;

/// Represents a type that can durably store rooms, queue items, and votes
#[async_trait]
pub trait QueueStore: Send + Sync + 'static {
    /// Creates a new room, failing with [StoreError::Conflict] if the code is taken
    async fn create_room(&self, new_room: NewRoom) -> StoreResult<Room>;
    async fn room_by_id(&self, room_id: RoomId) -> StoreResult<Room>;
    async fn room_by_code(&self, code: &str) -> StoreResult<Room>;
    /// Marks a room inactive, returning the updated room
    async fn deactivate_room(&self, room_id: RoomId) -> StoreResult<Room>;

    async fn add_queue_item(&self, new_item: NewQueueItem) -> StoreResult<QueueItem>;
    async fn queue_item_by_id(&self, item_id: ItemId) -> StoreResult<QueueItem>;
    /// All unplayed items in a room, ordered by votes descending, then by
    /// creation time ascending. An unknown room returns an empty list
    async fn unplayed_items(&self, room_id: RoomId) -> StoreResult<Vec<QueueItem>>;
    /// The item that would play next, by the same ordering as [Self::unplayed_items]
    async fn next_unplayed_item(&self, room_id: RoomId) -> StoreResult<Option<QueueItem>>;
    async fn mark_played(&self, item_id: ItemId) -> StoreResult<QueueItem>;

    /// Records a user's vote on an item. A repeat vote by the same user
    /// overwrites the previous value in place
    async fn upsert_vote(&self, item_id: ItemId, user_id: UserId, value: i32) -> StoreResult<Vote>;
    /// Sums every current vote value on an item. No votes sums to zero
    async fn vote_sum(&self, item_id: ItemId) -> StoreResult<i32>;
    /// Writes a recomputed vote aggregate back to the item row
    async fn set_item_votes(&self, item_id: ItemId, votes: i32) -> StoreResult<()>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Unavailable(Box<dyn std::error::Error + Send + Sync>),
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to convert external errors into [StoreError]
pub trait IntoStoreError
where
    Self: Sized,
{
    /// Converts a row-missing error into [StoreError::NotFound],
    /// and anything else into [StoreError::Unavailable]
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> StoreError;
    /// Converts a unique constraint violation into [StoreError::Conflict],
    /// and anything else into [StoreError::Unavailable]
    fn unique_or(self, resource: &'static str, field: &'static str, value: &str) -> StoreError;
    fn any(self) -> StoreError;
}
