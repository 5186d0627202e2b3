mod channel;
mod config;
mod events;
mod playback;
mod rooms;
mod session;
mod store;
mod util;

pub use channel::*;
pub use config::*;
pub use events::*;
pub use playback::*;
pub use rooms::*;
pub use session::*;
pub use store::*;
pub use util::*;

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use log::{info, warn};

/// The syncwatch client system, facilitating room creation, joining, and
/// playback synchronization over a store and channel implementation.
pub struct SyncClient<S, C> {
    context: SyncContext<S, C>,
}

/// A type passed to the components of the client, to access the store, the
/// channel, the client identity, and the active sessions.
pub struct SyncContext<S, C> {
    pub config: Config,
    pub identity: SessionId,
    pub store: Arc<S>,
    pub channel: Arc<C>,

    pub sessions: Arc<DashMap<RoomCode, Weak<RoomSession<S, C>>>>,
}

impl<S, C> SyncClient<S, C>
where
    S: RoomStore,
    C: SyncChannel,
{
    /// Creates a client over the given adapters. Accepts owned or shared
    /// (`Arc`) values, so multiple clients can sit on one store and channel.
    pub fn new(
        config: Config,
        identity: SessionId,
        store: impl Into<Arc<S>>,
        channel: impl Into<Arc<C>>,
    ) -> Self {
        let context = SyncContext {
            config,
            identity,
            store: store.into(),
            channel: channel.into(),

            sessions: Default::default(),
        };

        Self { context }
    }

    pub fn identity(&self) -> &SessionId {
        &self.context.identity
    }

    /// Creates a new room around the given media and joins it as host.
    /// The room starts paused at position zero.
    pub async fn create_room(
        &self,
        media: MediaRefs,
    ) -> Result<Arc<RoomSession<S, C>>, SyncError> {
        if media.video.as_deref().map_or(true, str::is_empty) {
            return Err(SyncError::MissingVideo);
        }

        // Codes are random and not reserved ahead of time; on the rare
        // collision we roll a new one.
        let mut attempts = 0;

        let room = loop {
            let new_room = NewRoom {
                code: RoomCode::generate(),
                media: media.clone(),
                host_id: self.context.identity.clone(),
            };

            match self.context.store.create_room(new_room).await {
                Ok(room) => break room,
                Err(e @ StoreError::Conflict { .. }) => {
                    attempts += 1;
                    warn!("{e}, retrying with a fresh code");

                    if attempts >= self.context.config.create_retry_limit {
                        return Err(SyncError::CodesExhausted);
                    }
                }
                Err(e) => return Err(SyncError::Store(e)),
            }
        };

        info!("created room {}", room.code);

        Ok(self.attach(room))
    }

    /// Joins an existing room, fetching its authoritative state and
    /// subscribing to its events. Joining a room this client is already
    /// attached to returns the existing session.
    pub async fn join_room(&self, code: &RoomCode) -> Result<Arc<RoomSession<S, C>>, SyncError> {
        let existing = self
            .context
            .sessions
            .get(code)
            .and_then(|session| session.upgrade());

        if let Some(session) = existing {
            return Ok(session);
        }

        let room = match self.context.store.room_by_code(code).await {
            Ok(room) => room,
            Err(StoreError::NotFound { .. }) => return Err(SyncError::RoomNotFound(code.clone())),
            Err(e) => return Err(SyncError::Store(e)),
        };

        Ok(self.attach(room))
    }

    fn attach(&self, room: Room) -> Arc<RoomSession<S, C>> {
        let session = RoomSession::attach(&self.context, room);

        self.context
            .sessions
            .insert(session.code(), Arc::downgrade(&session));

        session
    }
}

impl<S, C> Clone for SyncContext<S, C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            identity: self.identity.clone(),
            store: self.store.clone(),
            channel: self.channel.clone(),
            sessions: self.sessions.clone(),
        }
    }
}
