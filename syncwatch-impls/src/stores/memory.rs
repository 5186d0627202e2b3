use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};

use syncwatch_core::{
    NewRoom, PrimaryKey, Room, RoomCode, RoomStore, StoreError, StoreResult,
};

/// An in-memory room store, for tests and single-process use. Codes are
/// stored normalized, so lookups are case-insensitive by construction.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: DashMap<RoomCode, Room>,
    next_id: AtomicI64,
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn room_by_code(&self, code: &RoomCode) -> StoreResult<Room> {
        self.rooms
            .get(code)
            .map(|room| room.clone())
            .ok_or_else(|| StoreError::room_not_found(code))
    }

    async fn create_room(&self, new_room: NewRoom) -> StoreResult<Room> {
        match self.rooms.entry(new_room.code.clone()) {
            Entry::Occupied(_) => Err(StoreError::room_conflict(&new_room.code)),
            Entry::Vacant(slot) => {
                let room = Room {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                    code: new_room.code,
                    media: new_room.media,
                    host_id: new_room.host_id,
                    playback_time: 0.0,
                    is_playing: false,
                    last_sync_at: None,
                };

                slot.insert(room.clone());

                Ok(room)
            }
        }
    }

    async fn update_room_state(
        &self,
        room_id: PrimaryKey,
        playback_time: f32,
        is_playing: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut room = self.room_by_id(room_id)?;

        room.playback_time = playback_time;
        room.is_playing = is_playing;
        room.last_sync_at = Some(at);

        Ok(())
    }

    async fn update_subtitle(&self, room_id: PrimaryKey, url: Option<String>) -> StoreResult<()> {
        let mut room = self.room_by_id(room_id)?;

        room.media.subtitle = url;

        Ok(())
    }
}

impl MemoryRoomStore {
    fn room_by_id(
        &self,
        room_id: PrimaryKey,
    ) -> StoreResult<dashmap::mapref::multiple::RefMutMulti<'_, RoomCode, Room>> {
        self.rooms
            .iter_mut()
            .find(|room| room.id == room_id)
            .ok_or(StoreError::NotFound {
                resource: "room",
                identifier: room_id.to_string(),
            })
    }
}
