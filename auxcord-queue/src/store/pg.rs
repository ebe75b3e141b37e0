use async_trait::async_trait;
use auxcord_core::{ItemId, RoomId, UserId};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{IntoStoreError, QueueStore, StoreError, StoreResult};
use crate::{NewQueueItem, NewRoom, QueueItem, Room, Vote};

/// Postgres error code for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        id UUID PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        host_id UUID NOT NULL,
        name TEXT NOT NULL,
        active BOOLEAN NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS queue_items (
        id UUID PRIMARY KEY,
        room_id UUID NOT NULL REFERENCES rooms (id),
        user_id UUID NOT NULL,
        track_id TEXT NOT NULL,
        track_name TEXT NOT NULL,
        artist TEXT NOT NULL,
        votes INT NOT NULL,
        position INT NOT NULL,
        played BOOLEAN NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS queue_items_room_id_idx ON queue_items (room_id)",
    "CREATE TABLE IF NOT EXISTS votes (
        id UUID PRIMARY KEY,
        queue_item_id UUID NOT NULL REFERENCES queue_items (id),
        user_id UUID NOT NULL,
        value INT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        UNIQUE (queue_item_id, user_id)
    )",
];

/// A [QueueStore] backed by PostgreSQL
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects to the given database and creates any missing tables
    pub async fn new(url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        let store = Self { pool };
        store.ensure_schema().await?;

        Ok(store)
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(())
    }
}

#[async_trait]
impl QueueStore for PgStore {
    async fn create_room(&self, new_room: NewRoom) -> StoreResult<Room> {
        sqlx::query_as::<_, Room>(
            "INSERT INTO rooms (id, code, host_id, name, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $5)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new_room.code)
        .bind(new_room.host_id)
        .bind(&new_room.name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.unique_or("room", "code", &new_room.code))
    }

    async fn room_by_id(&self, room_id: RoomId) -> StoreResult<Room> {
        sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn room_by_code(&self, code: &str) -> StoreResult<Room> {
        sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE code = $1")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "code"))
    }

    async fn deactivate_room(&self, room_id: RoomId) -> StoreResult<Room> {
        sqlx::query_as::<_, Room>(
            "UPDATE rooms SET active = FALSE, updated_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(room_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn add_queue_item(&self, new_item: NewQueueItem) -> StoreResult<QueueItem> {
        sqlx::query_as::<_, QueueItem>(
            "INSERT INTO queue_items
                (id, room_id, user_id, track_id, track_name, artist,
                votes, position, played, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, FALSE, $8, $8)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new_item.room_id)
        .bind(new_item.user_id)
        .bind(&new_item.track_id)
        .bind(&new_item.track_name)
        .bind(&new_item.artist)
        .bind(new_item.position)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn queue_item_by_id(&self, item_id: ItemId) -> StoreResult<QueueItem> {
        sqlx::query_as::<_, QueueItem>("SELECT * FROM queue_items WHERE id = $1")
            .bind(item_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("queue item", "id"))
    }

    async fn unplayed_items(&self, room_id: RoomId) -> StoreResult<Vec<QueueItem>> {
        sqlx::query_as::<_, QueueItem>(
            "SELECT * FROM queue_items
            WHERE room_id = $1 AND played = FALSE
            ORDER BY votes DESC, created_at ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn next_unplayed_item(&self, room_id: RoomId) -> StoreResult<Option<QueueItem>> {
        sqlx::query_as::<_, QueueItem>(
            "SELECT * FROM queue_items
            WHERE room_id = $1 AND played = FALSE
            ORDER BY votes DESC, created_at ASC
            LIMIT 1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn mark_played(&self, item_id: ItemId) -> StoreResult<QueueItem> {
        sqlx::query_as::<_, QueueItem>(
            "UPDATE queue_items SET played = TRUE, updated_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(item_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("queue item", "id"))
    }

    async fn upsert_vote(&self, item_id: ItemId, user_id: UserId, value: i32) -> StoreResult<Vote> {
        sqlx::query_as::<_, Vote>(
            "INSERT INTO votes (id, queue_item_id, user_id, value, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (queue_item_id, user_id) DO UPDATE SET value = EXCLUDED.value
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(item_id)
        .bind(user_id)
        .bind(value)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn vote_sum(&self, item_id: ItemId) -> StoreResult<i32> {
        sqlx::query_scalar::<_, i32>(
            "SELECT CAST(COALESCE(SUM(value), 0) AS INT) FROM votes WHERE queue_item_id = $1",
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn set_item_votes(&self, item_id: ItemId, votes: i32) -> StoreResult<()> {
        let result = sqlx::query("UPDATE queue_items SET votes = $2, updated_at = $3 WHERE id = $1")
            .bind(item_id)
            .bind(votes)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                resource: "queue item",
                identifier: "id",
            });
        }

        Ok(())
    }
}

impl IntoStoreError for sqlx::Error {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> StoreError {
        match self {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                resource,
                identifier,
            },
            e => e.any(),
        }
    }

    fn unique_or(self, resource: &'static str, field: &'static str, value: &str) -> StoreError {
        let is_unique_violation = self
            .as_database_error()
            .and_then(|e| e.code())
            .map_or(false, |code| code == UNIQUE_VIOLATION);

        if is_unique_violation {
            StoreError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }
        } else {
            self.any()
        }
    }

    fn any(self) -> StoreError {
        StoreError::Unavailable(self.into())
    }
}
