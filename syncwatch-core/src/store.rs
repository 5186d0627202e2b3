use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{NewRoom, PrimaryKey, Room, RoomCode};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record in the store doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    /// A record with the same unique value already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    /// The store could not be reached. Never reported as [`StoreError::NotFound`].
    #[error(transparent)]
    Unavailable(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn room_not_found(code: &RoomCode) -> Self {
        Self::NotFound {
            resource: "room",
            identifier: code.to_string(),
        }
    }

    pub fn room_conflict(code: &RoomCode) -> Self {
        Self::Conflict {
            resource: "room",
            field: "code",
            value: code.to_string(),
        }
    }

    pub fn unavailable(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Box::new(error))
    }
}

/// Represents a type that can persist room records.
///
/// Lookups are case-insensitive on the code; [`RoomCode`] already
/// normalizes to uppercase.
#[async_trait]
pub trait RoomStore: Send + Sync + 'static {
    async fn room_by_code(&self, code: &RoomCode) -> StoreResult<Room>;

    /// Persists a new room with `is_playing = false` and `playback_time = 0`.
    /// Fails with [`StoreError::Conflict`] when the code is taken.
    async fn create_room(&self, new_room: NewRoom) -> StoreResult<Room>;

    /// Overwrites the authoritative playback state of a room.
    async fn update_room_state(
        &self,
        room_id: PrimaryKey,
        playback_time: f32,
        is_playing: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Sets or clears the subtitle reference of a room.
    async fn update_subtitle(&self, room_id: PrimaryKey, url: Option<String>) -> StoreResult<()>;
}
