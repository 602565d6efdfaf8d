//! Room store adapter.
//!
//! The shared document lives behind [`RoomStore`]: full writes, merge-patch
//! updates, a compare-and-swap update, reads, removal and change
//! subscription. The store pushes the whole current room to every
//! subscriber on each change, and once immediately on subscribe.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  update / update_if  ┌─────────────┐  snapshot  ┌──────────┐
//! │ Session  │─────────────────────▶│  RoomStore  │───────────▶│ Session  │
//! │  (host)  │◀─────────────────────│ roomId→Room │───────────▶│ (guest)  │
//! └──────────┘       snapshot       └─────────────┘            └──────────┘
//! ```
//!
//! Each subscriber sees its snapshots in commit order. Nothing orders one
//! subscriber's view against another's, which is why racing writers go
//! through [`RoomStore::update_if`].

pub mod memory;

pub use memory::MemoryRoomStore;

use std::fmt;

use serde_json::{json, Map, Value};

use super::error::StoreError;
use super::patch::{self, RoomPatch};
use super::room::{GameState, Role, Room, RoomId};

/// Receives the current room (`None` once it no longer exists).
///
/// Called with the store's internal lock held; it must queue the snapshot
/// and return, never call back into the store.
pub type SnapshotCallback = Box<dyn Fn(Option<Room>) + Send + Sync>;

/// Shared room document storage.
pub trait RoomStore: Send + Sync {
    /// Replace the whole document.
    fn write(&self, room: &Room) -> Result<(), StoreError>;

    /// Merge `patch` into the document.
    fn update(&self, id: &RoomId, patch: &RoomPatch) -> Result<(), StoreError>;

    /// Merge `patch` only if every field in `expected` still holds.
    fn update_if(
        &self,
        id: &RoomId,
        expected: &Precondition,
        patch: &RoomPatch,
    ) -> Result<(), StoreError>;

    fn read(&self, id: &RoomId) -> Result<Room, StoreError>;

    /// Delete the document. Removing a missing room is not an error.
    fn remove(&self, id: &RoomId) -> Result<(), StoreError>;

    /// Watch a room until the returned handle is dropped.
    fn subscribe(&self, id: &RoomId, callback: SnapshotCallback) -> Subscription;
}

/// Field values a conditional update expects to find.
///
/// `null` stands for an absent field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Precondition {
    expected: Map<String, Value>,
}

impl Precondition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `field` to hold `value`.
    pub fn expect(mut self, field: &str, value: Value) -> Self {
        self.expected.insert(field.to_string(), value);
        self
    }

    /// The ball clock of `room`: both pending choices, the ball count and
    /// the innings. Any resolution of this snapshot's ball changes it.
    pub fn ball_clock(room: &Room) -> Self {
        Self::new()
            .expect("hostChoice", json!(room.host_choice))
            .expect("guestChoice", json!(room.guest_choice))
            .expect("currentBalls", json!(room.current_balls))
            .expect("inningsState", json!(room.innings_state))
    }

    /// The ball `role` is choosing for, as seen in `room`: this role's
    /// choice still empty, same phase, ball count and innings.
    pub fn open_choice(room: &Room, role: Role) -> Self {
        let field = match role {
            Role::Host => "hostChoice",
            Role::Guest => "guestChoice",
        };
        Self::new()
            .expect(field, Value::Null)
            .expect("gameState", json!(room.game_state))
            .expect("currentBalls", json!(room.current_balls))
            .expect("inningsState", json!(room.innings_state))
    }

    /// Toss not yet drawn.
    pub fn untossed() -> Self {
        Self::in_phase(GameState::Toss).expect("tossWinner", Value::Null)
    }

    /// Bat or bowl not yet declared.
    pub fn undeclared() -> Self {
        Self::in_phase(GameState::Choice).expect("battingTeam", Value::Null)
    }

    /// An empty guest seat in a waiting room.
    pub fn vacant_seat() -> Self {
        Self::new()
            .expect("guestName", Value::Null)
            .expect("gameState", json!(GameState::Waiting))
    }

    /// The room is in `state`.
    pub fn in_phase(state: GameState) -> Self {
        Self::new().expect("gameState", json!(state))
    }

    /// Check the expectations against `room`.
    pub fn holds(&self, room: &Room) -> Result<bool, serde_json::Error> {
        let document = patch::to_object(room)?;
        Ok(self
            .expected
            .iter()
            .all(|(field, value)| document.get(field).unwrap_or(&Value::Null) == value))
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }
}

/// Live subscription. Dropping it stops delivery.
pub struct Subscription {
    room_id: RoomId,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(room_id: RoomId, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            room_id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Stop delivery now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("room_id", &self.room_id)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
