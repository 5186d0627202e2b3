use async_trait::async_trait;
use crossbeam::channel::Receiver;
use thiserror::Error;

use crate::{Id, RoomCode, SyncEvent};

pub type SubscriptionId = Id<Subscription>;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ChannelError(pub Box<dyn std::error::Error + Send + Sync>);

/// A best-effort broadcast transport scoped to one room.
///
/// Delivery is at-most-once and unordered across senders; messages may be
/// duplicated or dropped under transport retries. The transport performs no
/// filtering: a sender receives its own events back, and discarding them is
/// the engine's job.
#[async_trait]
pub trait SyncChannel: Send + Sync + 'static {
    async fn publish(&self, code: &RoomCode, event: SyncEvent) -> Result<(), ChannelError>;
    fn subscribe(&self, code: &RoomCode) -> Subscription;
}

/// A live subscription to a room's events. Dropping it unsubscribes, which
/// also disconnects every receiver handed out by [`Subscription::receiver`].
pub struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<SyncEvent>,
    cleanup: Option<Box<dyn FnOnce(SubscriptionId) + Send + Sync>>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        receiver: Receiver<SyncEvent>,
        cleanup: impl FnOnce(SubscriptionId) + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            receiver,
            cleanup: Some(Box::new(cleanup)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Hands out a receiving end, to be consumed on a worker. The
    /// subscription itself keeps the registration alive.
    pub fn receiver(&self) -> Receiver<SyncEvent> {
        self.receiver.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup(self.id)
        }
    }
}
