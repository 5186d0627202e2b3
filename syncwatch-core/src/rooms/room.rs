use chrono::{DateTime, Utc};

use crate::{RoomCode, SessionId};

/// The type used for primary keys in the room store.
pub type PrimaryKey = i64;

/// References to the media a room plays. Storage and delivery of the assets
/// themselves happen outside the engine; these are opaque URLs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaRefs {
    pub video: Option<String>,
    pub art: Option<String>,
    pub subtitle: Option<String>,
}

impl MediaRefs {
    pub fn video(url: impl Into<String>) -> Self {
        Self {
            video: Some(url.into()),
            ..Default::default()
        }
    }
}

/// A shared viewing session and its last known authoritative playback state.
///
/// The authoritative copy lives in the store; every client holds a cached,
/// possibly stale one that converges through sync events and drift checks.
/// Abandoned rooms are inert, never reaped.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: PrimaryKey,
    pub code: RoomCode,
    pub media: MediaRefs,
    /// The creator of the room. Advisory; no operation is host-gated.
    pub host_id: SessionId,
    /// Last known position in seconds, meaningful relative to `last_sync_at`.
    pub playback_time: f32,
    pub is_playing: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// The data required to create a room.
#[derive(Debug)]
pub struct NewRoom {
    pub code: RoomCode,
    pub media: MediaRefs,
    pub host_id: SessionId,
}
