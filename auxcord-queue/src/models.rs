use auxcord_core::{ItemId, RoomId, UserId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A listening session that users join by code to queue songs together
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Room {
    pub id: RoomId,
    /// Six character code users type to find the room
    pub code: String,
    pub host_id: UserId,
    pub name: String,
    /// Inactive rooms refuse new joins and writes
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A song queued in a room
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct QueueItem {
    pub id: ItemId,
    pub room_id: RoomId,
    /// The user that queued the song
    pub user_id: UserId,
    pub track_id: String,
    pub track_name: String,
    pub artist: String,
    /// Aggregate of all current vote values on this item
    pub votes: i32,
    /// Insertion order within the room, starting at 0
    pub position: i32,
    pub played: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's current vote on a queue item. One row per (item, user)
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub queue_item_id: ItemId,
    pub user_id: UserId,
    /// Always +1 or -1
    pub value: i32,
    pub created_at: DateTime<Utc>,
}

/// [Room] without the generated parts
#[derive(Debug)]
pub struct NewRoom {
    pub code: String,
    pub host_id: UserId,
    pub name: String,
}

/// A track submission, before a position and room are assigned
#[derive(Debug)]
pub struct NewTrack {
    pub track_id: String,
    pub track_name: String,
    pub artist: String,
}

/// [QueueItem] without the generated parts
#[derive(Debug)]
pub struct NewQueueItem {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub track_id: String,
    pub track_name: String,
    pub artist: String,
    pub position: i32,
}
