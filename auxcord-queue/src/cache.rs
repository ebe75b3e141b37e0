use async_trait::async_trait;
use auxcord_core::RoomId;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;

use crate::Room;

/// Represents a type that caches room lookups in front of the store.
///
/// A cache is an accelerator only. Misses and failures both mean
/// "go ask the store", never "the room doesn't exist".
#[async_trait]
pub trait RoomCache: Send + Sync + 'static {
    /// Returns the cached room, or `None` on a miss
    async fn room(&self, room_id: RoomId) -> Result<Option<Room>, CacheError>;
    /// Stores a room, replacing any previous entry for it
    async fn insert(&self, room: Room) -> Result<(), CacheError>;
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Unavailable(Box<dyn std::error::Error + Send + Sync>),
}

struct CachedRoom {
    room: Room,
    expires_at: DateTime<Utc>,
}

/// A [RoomCache] held in process memory, with per-entry expiry
pub struct MemoryCache {
    ttl: Duration,
    entries: DashMap<RoomId, CachedRoom>,
}

impl MemoryCache {
    pub const DEFAULT_TTL_HOURS: i64 = 24;

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(Duration::hours(Self::DEFAULT_TTL_HOURS))
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}

#[async_trait]
impl RoomCache for MemoryCache {
    async fn room(&self, room_id: RoomId) -> Result<Option<Room>, CacheError> {
        let entry = match self.entries.get(&room_id) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if entry.expires_at > Utc::now() {
            return Ok(Some(entry.room.clone()));
        }

        drop(entry);
        self.entries.remove(&room_id);

        Ok(None)
    }

    async fn insert(&self, room: Room) -> Result<(), CacheError> {
        let cached = CachedRoom {
            room,
            expires_at: Utc::now() + self.ttl,
        };

        self.entries.insert(cached.room.id, cached);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;

    fn sample_room() -> Room {
        let now = Utc::now();

        Room {
            id: Uuid::new_v4(),
            code: "XYZ789".to_string(),
            host_id: Uuid::new_v4(),
            name: "Late night".to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn fresh_entries_come_back() {
        let cache = MemoryCache::with_default_ttl();
        let room = sample_room();

        cache.insert(room.clone()).await.unwrap();

        assert_eq!(cache.room(room.id).await.unwrap(), Some(room));
        assert_eq!(cache.room(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_fall_away() {
        let cache = MemoryCache::new(Duration::zero());
        let room = sample_room();

        cache.insert(room.clone()).await.unwrap();

        assert_eq!(cache.room(room.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn inserting_again_replaces_the_entry() {
        let cache = MemoryCache::with_default_ttl();
        let room = sample_room();

        cache.insert(room.clone()).await.unwrap();

        let mut deactivated = room.clone();
        deactivated.active = false;
        cache.insert(deactivated.clone()).await.unwrap();

        assert_eq!(cache.room(room.id).await.unwrap(), Some(deactivated));
    }
}
