use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RoomId = Uuid;
pub type UserId = Uuid;
pub type ItemId = Uuid;

/// Events flowing through the bus and out to live room connections.
///
/// Every variant is scoped to a single room. Ordering is only meaningful
/// between events of the same room, and delivery to consumers may be
/// at-least-once, so listeners must tolerate duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum DomainEvent {
    /// A track was added to a room's queue
    SongAdded {
        room_id: RoomId,
        user_id: UserId,
        item_id: ItemId,
        track_id: String,
        track_name: String,
        artist: String,
        timestamp: DateTime<Utc>,
    },
    /// A single user cast or changed their vote on a queue item
    SongVoted {
        room_id: RoomId,
        user_id: UserId,
        item_id: ItemId,
        value: i32,
        timestamp: DateTime<Utc>,
    },
    /// A queue item's recomputed aggregate changed
    VoteUpdate {
        room_id: RoomId,
        item_id: ItemId,
        total_votes: i32,
        timestamp: DateTime<Utc>,
    },
    /// Playback of a track began in a room
    SongStarted {
        room_id: RoomId,
        user_id: UserId,
        track_id: String,
        track_name: String,
        timestamp: DateTime<Utc>,
    },
    /// Playback of a queue item finished, published by the playback driver
    SongCompleted {
        room_id: RoomId,
        item_id: ItemId,
        track_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A user's live connection joined the room
    UserJoined {
        room_id: RoomId,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    /// A user's live connection left the room
    UserLeft {
        room_id: RoomId,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// The room this event belongs to, used to pick broadcast recipients.
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::SongAdded { room_id, .. } => *room_id,
            Self::SongVoted { room_id, .. } => *room_id,
            Self::VoteUpdate { room_id, .. } => *room_id,
            Self::SongStarted { room_id, .. } => *room_id,
            Self::SongCompleted { room_id, .. } => *room_id,
            Self::UserJoined { room_id, .. } => *room_id,
            Self::UserLeft { room_id, .. } => *room_id,
        }
    }
}
