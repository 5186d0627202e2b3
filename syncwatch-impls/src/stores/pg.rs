use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Error as SqlxError, PgPool, Row,
};

use syncwatch_core::{
    MediaRefs, NewRoom, PrimaryKey, Room, RoomCode, RoomStore, SessionId, StoreError, StoreResult,
};

/// A postgres room store, one row per room:
///
/// ```sql
/// CREATE TABLE rooms (
///     id            bigserial PRIMARY KEY,
///     code          text NOT NULL UNIQUE,
///     video_url     text,
///     art_url       text,
///     subtitle_url  text,
///     host_id       text NOT NULL,
///     playback_time double precision NOT NULL DEFAULT 0,
///     is_playing    boolean,
///     last_sync_at  timestamptz
/// );
/// ```
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    pub async fn new(url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(StoreError::unavailable)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn room_by_code(&self, code: &RoomCode) -> StoreResult<Room> {
        let row = sqlx::query("SELECT * FROM rooms WHERE upper(code) = $1")
            .bind(code.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or(e, code))?;

        room_from_row(&row)
    }

    async fn create_room(&self, new_room: NewRoom) -> StoreResult<Room> {
        let row = sqlx::query(
            "INSERT INTO rooms (code, video_url, art_url, subtitle_url, host_id, playback_time, is_playing)
             VALUES ($1, $2, $3, $4, $5, 0, false)
             RETURNING *",
        )
        .bind(new_room.code.as_str())
        .bind(&new_room.media.video)
        .bind(&new_room.media.art)
        .bind(&new_room.media.subtitle)
        .bind(new_room.host_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            SqlxError::Database(db) if db.is_unique_violation() => {
                StoreError::room_conflict(&new_room.code)
            }
            _ => StoreError::unavailable(e),
        })?;

        room_from_row(&row)
    }

    async fn update_room_state(
        &self,
        room_id: PrimaryKey,
        playback_time: f32,
        is_playing: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE rooms SET playback_time = $1, is_playing = $2, last_sync_at = $3 WHERE id = $4",
        )
        .bind(playback_time as f64)
        .bind(is_playing)
        .bind(at)
        .bind(room_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::unavailable)
        .map(|_| ())
    }

    async fn update_subtitle(&self, room_id: PrimaryKey, url: Option<String>) -> StoreResult<()> {
        sqlx::query("UPDATE rooms SET subtitle_url = $1 WHERE id = $2")
            .bind(url)
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::unavailable)
            .map(|_| ())
    }
}

/// Turns a row-miss into [`StoreError::NotFound`]; any other failure is a
/// transport problem and stays [`StoreError::Unavailable`].
fn not_found_or(error: SqlxError, code: &RoomCode) -> StoreError {
    match error {
        SqlxError::RowNotFound => StoreError::room_not_found(code),
        e => StoreError::unavailable(e),
    }
}

fn room_from_row(row: &PgRow) -> StoreResult<Room> {
    let read = || -> Result<Room, SqlxError> {
        let code: String = row.try_get("code")?;
        let code = RoomCode::parse(&code).map_err(|e| SqlxError::Decode(Box::new(e)))?;

        Ok(Room {
            id: row.try_get("id")?,
            code,
            media: MediaRefs {
                video: row.try_get("video_url")?,
                art: row.try_get("art_url")?,
                subtitle: row.try_get("subtitle_url")?,
            },
            host_id: SessionId::from(row.try_get::<String, _>("host_id")?),
            playback_time: row.try_get::<Option<f64>, _>("playback_time")?.unwrap_or(0.0) as f32,
            is_playing: row.try_get::<Option<bool>, _>("is_playing")?.unwrap_or(false),
            last_sync_at: row.try_get("last_sync_at")?,
        })
    };

    read().map_err(StoreError::unavailable)
}
