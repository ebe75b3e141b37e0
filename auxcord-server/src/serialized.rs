//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use auxcord_queue::{QueueItem as QueueItemData, Room as RoomData};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct Room {
    id: Uuid,
    code: String,
    host_id: Uuid,
    name: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueueItem {
    id: Uuid,
    room_id: Uuid,
    user_id: Uuid,
    track_id: String,
    track_name: String,
    artist: String,
    votes: i32,
    position: i32,
    played: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    status: &'static str,
}

impl Health {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            code: self.code.clone(),
            host_id: self.host_id,
            name: self.name.clone(),
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ToSerialized<QueueItem> for QueueItemData {
    fn to_serialized(&self) -> QueueItem {
        QueueItem {
            id: self.id,
            room_id: self.room_id,
            user_id: self.user_id,
            track_id: self.track_id.clone(),
            track_name: self.track_name.clone(),
            artist: self.artist.clone(),
            votes: self.votes,
            position: self.position,
            played: self.played,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
