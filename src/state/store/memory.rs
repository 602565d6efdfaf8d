//! In-process room store.
//!
//! One mutex guards every room and subscriber list. Snapshots are delivered
//! under that lock, so each subscriber sees changes in commit order.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{Precondition, RoomStore, SnapshotCallback, Subscription};
use crate::state::error::StoreError;
use crate::state::patch::RoomPatch;
use crate::state::room::{Room, RoomId};

const LOG_TARGET: &str = "hand_cricket::store";

struct Subscriber {
    id: u64,
    callback: SnapshotCallback,
}

#[derive(Default)]
struct Inner {
    /// Rooms by ID
    rooms: HashMap<RoomId, Room>,

    /// Subscribers by watched room ID
    subscribers: HashMap<RoomId, Vec<Subscriber>>,

    next_subscriber: u64,

    /// Successful writes, updates and removals
    mutations: u64,
}

impl Inner {
    /// Push the current room to everyone watching it.
    fn publish(&self, id: &RoomId) {
        let Some(subscribers) = self.subscribers.get(id) else {
            return;
        };
        let snapshot = self.rooms.get(id);
        for subscriber in subscribers {
            (subscriber.callback)(snapshot.cloned());
        }
    }

    fn unsubscribe(&mut self, id: &RoomId, subscriber: u64) {
        if let Some(subscribers) = self.subscribers.get_mut(id) {
            subscribers.retain(|s| s.id != subscriber);
            if subscribers.is_empty() {
                self.subscribers.remove(id);
            }
        }
    }
}

/// Room store held in memory. Clones share the same rooms.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count stored rooms.
    pub fn room_count(&self) -> usize {
        self.inner.lock().rooms.len()
    }

    /// Count successful mutations since creation.
    pub fn mutation_count(&self) -> u64 {
        self.inner.lock().mutations
    }

    /// Count live subscriptions on a room.
    pub fn subscriber_count(&self, id: &RoomId) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(id)
            .map_or(0, Vec::len)
    }

    fn patch_room(
        &self,
        id: &RoomId,
        expected: Option<&Precondition>,
        patch: &RoomPatch,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let current = inner
            .rooms
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if let Some(expected) = expected {
            if !expected.holds(current)? {
                return Err(StoreError::ConditionFailed(id.clone()));
            }
        }

        let patched = patch.apply(current)?;
        inner.rooms.insert(id.clone(), patched);
        inner.mutations += 1;
        tracing::trace!(target: LOG_TARGET, room = %id, fields = patch.len(), "room patched");
        inner.publish(id);
        Ok(())
    }
}

impl RoomStore for MemoryRoomStore {
    fn write(&self, room: &Room) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.rooms.insert(room.id.clone(), room.clone());
        inner.mutations += 1;
        tracing::trace!(target: LOG_TARGET, room = %room.id, "room written");
        inner.publish(&room.id);
        Ok(())
    }

    fn update(&self, id: &RoomId, patch: &RoomPatch) -> Result<(), StoreError> {
        self.patch_room(id, None, patch)
    }

    fn update_if(
        &self,
        id: &RoomId,
        expected: &Precondition,
        patch: &RoomPatch,
    ) -> Result<(), StoreError> {
        self.patch_room(id, Some(expected), patch)
    }

    fn read(&self, id: &RoomId) -> Result<Room, StoreError> {
        self.inner
            .lock()
            .rooms
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn remove(&self, id: &RoomId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.rooms.remove(id).is_some() {
            inner.mutations += 1;
            tracing::trace!(target: LOG_TARGET, room = %id, "room removed");
            inner.publish(id);
        }
        Ok(())
    }

    fn subscribe(&self, id: &RoomId, callback: SnapshotCallback) -> Subscription {
        let mut inner = self.inner.lock();
        let subscriber = inner.next_subscriber;
        inner.next_subscriber += 1;

        callback(inner.rooms.get(id).cloned());
        inner
            .subscribers
            .entry(id.clone())
            .or_default()
            .push(Subscriber {
                id: subscriber,
                callback,
            });

        let store: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let room_id = id.clone();
        Subscription::new(id.clone(), move || {
            if let Some(store) = store.upgrade() {
                store.lock().unsubscribe(&room_id, subscriber);
            }
        })
    }
}

impl fmt::Debug for MemoryRoomStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryRoomStore")
            .field("rooms", &inner.rooms.len())
            .field("watched_rooms", &inner.subscribers.len())
            .field("mutations", &inner.mutations)
            .finish()
    }
}
