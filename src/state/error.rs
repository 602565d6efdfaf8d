//! Error types.
//!
//! Nothing here is fatal. Every failure leaves the local view where it was,
//! waiting for either a retry from the user or the next observed snapshot.

use thiserror::Error;

use super::machine::InvalidTransition;
use super::room::{GameState, RoomId};

/// Limits that would make a game unplayable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_balls must be at least 1")]
    ZeroBalls,
    #[error("max_wickets must be at least 1")]
    ZeroWickets,
    #[error("room_code_len must be at least 1")]
    ZeroRoomCodeLen,
}

/// Local precondition failures. Rejected before any mutation is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("player name must not be empty")]
    EmptyName,

    #[error("room code must not be empty")]
    EmptyRoomCode,

    #[error("room code {0:?} is not alphanumeric")]
    MalformedRoomCode(String),

    #[error("choice {0} is outside 1..=6")]
    ChoiceOutOfRange(u8),

    #[error("a choice is already pending for this ball")]
    ChoicePending,

    #[error("action needs phase {expected}, player is in {actual}")]
    WrongPhase {
        expected: GameState,
        actual: GameState,
    },

    #[error("not seated in a room")]
    NotInRoom,

    #[error("already seated in room {0}")]
    AlreadyInRoom(RoomId),

    #[error("only the host can toss")]
    NotHost,

    #[error("only the toss winner can choose to bat or bowl")]
    NotTossWinner,

    #[error("room document is inconsistent: {0}")]
    InvalidRoom(&'static str),
}

/// Failures reported by a [`RoomStore`](super::store::RoomStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room {0} does not exist")]
    NotFound(RoomId),

    /// A conditional update found the guarded fields changed.
    #[error("room {0} changed under a conditional update")]
    ConditionFailed(RoomId),

    #[error("room document codec failed")]
    Codec(#[from] serde_json::Error),
}

/// Errors surfaced by a [`Session`](super::session::Session).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("room {0} already has a guest")]
    RoomFull(RoomId),

    /// Lost a conditional-update race; the winner already advanced the room.
    #[error("stale write to room {0} rejected")]
    StaleWriteRejected(RoomId),

    #[error("room {0} is gone")]
    RoomVanished(RoomId),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Check if the error is dropped rather than shown to the player.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::StaleWriteRejected(_))
    }
}
