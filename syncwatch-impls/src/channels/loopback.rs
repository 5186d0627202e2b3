use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use crossbeam::channel::{unbounded, Sender};
use dashmap::DashMap;

use syncwatch_core::{
    ChannelError, RoomCode, Subscription, SubscriptionId, SyncChannel, SyncEvent,
};

/// An in-process broadcast channel.
///
/// Every subscriber of a room receives every published event, including the
/// publisher itself: like the real transport, it does no filtering, leaving
/// self-suppression to the engine.
#[derive(Default)]
pub struct LoopbackChannel {
    subscribers: Arc<DashMap<RoomCode, HashMap<SubscriptionId, Sender<SyncEvent>>>>,
}

#[async_trait]
impl SyncChannel for LoopbackChannel {
    async fn publish(&self, code: &RoomCode, event: SyncEvent) -> Result<(), ChannelError> {
        if let Some(room) = self.subscribers.get(code) {
            for sender in room.values() {
                // A subscriber that went away mid-send is just a drop
                let _ = sender.send(event.clone());
            }
        }

        Ok(())
    }

    fn subscribe(&self, code: &RoomCode) -> Subscription {
        let id = SubscriptionId::new();
        let (sender, receiver) = unbounded();

        self.subscribers
            .entry(code.clone())
            .or_default()
            .insert(id, sender);

        let subscribers = self.subscribers.clone();
        let code = code.clone();

        Subscription::new(id, receiver, move |id| {
            if let Some(mut room) = subscribers.get_mut(&code) {
                room.remove(&id);
            }
        })
    }
}
