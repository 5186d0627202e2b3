use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use chrono::Utc;
use crossbeam::channel::{unbounded, Receiver};
use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::{
    runtime_handle, CommandReceiver, Id, LocalAction, PlaybackCommand, PrimaryKey, Reconciler,
    Room, RoomCode, RoomStore, SessionId, Subscription, SyncChannel, SyncContext, SyncEvent,
};

pub type ListenerId = Id<PlaybackListener>;

/// A client's live attachment to a room: the reconciliation engine plus the
/// channel and store plumbing around it.
///
/// Dropping the session unsubscribes from the channel and stops the event
/// forwarder, so nothing from a torn-down room leaks into the next one.
pub struct RoomSession<S, C> {
    context: SyncContext<S, C>,
    /// The cached copy of the authoritative room record.
    room: Mutex<Room>,
    engine: Mutex<Reconciler>,
    listeners: DashMap<ListenerId, crossbeam::channel::Sender<PlaybackCommand>>,
    /// Keeps the channel registration alive for the life of the session.
    _subscription: Subscription,
}

impl<S, C> RoomSession<S, C>
where
    S: RoomStore,
    C: SyncChannel,
{
    pub(crate) fn attach(context: &SyncContext<S, C>, room: Room) -> Arc<Self> {
        let subscription = context.channel.subscribe(&room.code);
        let receiver = subscription.receiver();

        let engine = Reconciler::new(
            context.config.clone(),
            context.identity.clone(),
            room.playback_time,
            room.is_playing,
        );

        info!("joined room {}", room.code);

        let session = Arc::new(Self {
            context: context.clone(),
            room: Mutex::new(room),
            engine: Mutex::new(engine),
            listeners: DashMap::new(),
            _subscription: subscription,
        });

        spawn_forwarder(&session, receiver);

        session
    }

    /// Returns the cached room record.
    pub fn room(&self) -> Room {
        self.room.lock().clone()
    }

    pub fn code(&self) -> RoomCode {
        self.room.lock().code.clone()
    }

    /// Whether this client created the room. Advisory only.
    pub fn is_host(&self) -> bool {
        self.room.lock().host_id == self.context.identity
    }

    pub fn identity(&self) -> &SessionId {
        &self.context.identity
    }

    /// Attaches a listener receiving [`PlaybackCommand`]s for applied peer
    /// intent and drift corrections. Any number of listeners may coexist;
    /// dropping one detaches it without affecting the others.
    pub fn listen(self: &Arc<Self>) -> PlaybackListener {
        let id = ListenerId::new();
        let (sender, receiver) = unbounded();

        self.listeners.insert(id, sender);

        let weak = Arc::downgrade(self);

        PlaybackListener {
            id,
            receiver,
            detach: Box::new(move |id| {
                if let Some(session) = weak.upgrade() {
                    session.listeners.remove(&id);
                }
            }),
        }
    }

    /// Starts playback at the current position.
    pub fn play(&self) {
        self.local_action(LocalAction::Play)
    }

    /// Pauses playback, leaving the position untouched.
    pub fn pause(&self) {
        self.local_action(LocalAction::Pause)
    }

    /// Jumps to the given position, in seconds.
    pub fn seek(&self, position: f32) {
        self.local_action(LocalAction::Seek(position))
    }

    /// Reports the media element's observed position, in seconds. Drives
    /// passive drift detection while playing.
    pub fn observe_time(&self, position: f32) {
        let correction = self.engine.lock().observe(position, Instant::now());

        if let Some(position) = correction {
            debug!("correcting drift in room {} to {position}s", self.code());
            self.broadcast_command(PlaybackCommand::Seek { position });
        }
    }

    /// Sets or clears the subtitle reference, for everyone joining later.
    /// The write is fire-and-forget like any other state write.
    pub fn set_subtitle(&self, url: Option<String>) {
        let room_id = {
            let mut room = self.room.lock();
            room.media.subtitle = url.clone();
            room.id
        };

        let store = self.context.store.clone();

        runtime_handle().spawn(async move {
            if let Err(e) = store.update_subtitle(room_id, url).await {
                warn!("failed to persist subtitle for room #{room_id}: {e}");
            }
        });
    }

    fn local_action(&self, action: LocalAction) {
        let (event, is_playing) = {
            let mut engine = self.engine.lock();
            let event = engine.apply_local(action, Utc::now(), Instant::now());

            (event, engine.is_playing())
        };

        // The cache follows the optimistic local state immediately
        let room_id = {
            let mut room = self.room.lock();
            room.playback_time = event.time;
            room.is_playing = is_playing;
            room.last_sync_at = Some(event.emitted_at);
            room.id
        };

        self.publish_and_persist(room_id, event, is_playing);
    }

    /// Broadcast and persistence are two independent, unordered background
    /// effects of one action. Either may fail without rolling back the
    /// optimistic local state; the next action or drift check re-converges.
    fn publish_and_persist(&self, room_id: PrimaryKey, event: SyncEvent, is_playing: bool) {
        let code = self.code();
        let channel = self.context.channel.clone();
        let store = self.context.store.clone();

        let time = event.time;
        let at = event.emitted_at;

        let handle = runtime_handle();

        handle.spawn({
            let code = code.clone();

            async move {
                if let Err(e) = channel.publish(&code, event).await {
                    warn!("failed to publish sync event for room {code}: {e}");
                }
            }
        });

        handle.spawn(async move {
            if let Err(e) = store.update_room_state(room_id, time, is_playing, at).await {
                warn!("failed to persist state of room {code}: {e}");
            }
        });
    }

    fn handle_event(&self, event: SyncEvent) {
        // Sync events are meaningless until the room has a video
        if self.room.lock().media.video.is_none() {
            return;
        }

        let command = {
            let mut engine = self.engine.lock();
            let Some(command) = engine.apply_remote(&event, Instant::now()) else {
                return;
            };

            // The cached authoritative copy follows applied peer intent
            let mut room = self.room.lock();
            room.playback_time = engine.target_time();
            room.is_playing = engine.is_playing();
            room.last_sync_at = Some(event.emitted_at);

            command
        };

        self.broadcast_command(command);
    }

    fn broadcast_command(&self, command: PlaybackCommand) {
        self.listeners.retain(|_, sender| sender.send(command).is_ok());
    }
}

fn spawn_forwarder<S, C>(session: &Arc<RoomSession<S, C>>, receiver: Receiver<SyncEvent>)
where
    S: RoomStore,
    C: SyncChannel,
{
    let weak = Arc::downgrade(session);
    let code = session.code();

    // Ends when the session is dropped: the subscription goes with it,
    // which disconnects this receiver.
    thread::spawn(move || {
        while let Ok(event) = receiver.recv() {
            let Some(session) = weak.upgrade() else {
                break;
            };

            session.handle_event(event);
        }

        debug!("event forwarder for room {code} stopped");
    });
}

/// A handle receiving [`PlaybackCommand`]s from a session.
pub struct PlaybackListener {
    id: ListenerId,
    receiver: CommandReceiver,
    detach: Box<dyn Fn(ListenerId) + Send + Sync>,
}

impl PlaybackListener {
    /// Returns the next pending command without waiting.
    pub fn try_next(&self) -> Option<PlaybackCommand> {
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for the next command.
    pub fn next_timeout(&self, timeout: Duration) -> Option<PlaybackCommand> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

impl Drop for PlaybackListener {
    fn drop(&mut self) {
        (self.detach)(self.id)
    }
}
