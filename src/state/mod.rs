//! State management for hand cricket rooms.
//!
//! This module provides the core types and the pieces that move a room
//! through a game:
//!
//! - `config` - Game limits (balls, wickets, room code length)
//! - `room` - The shared room document and its enums
//! - `patch` - Field-level merge patches between two rooms
//! - `machine` - Phase state machine with validated transitions
//! - `resolution` - Ball scoring committed with a compare-and-set
//! - `store` - Room store contract and the in-memory store
//! - `projection` - One player's read-only view built from snapshots
//! - `session` - Player actions and the snapshot loop
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐          ┌──────────────────────────────┐
//! │        Session (host)        │          │        Session (guest)       │
//! │                              │          │                              │
//! │  actions ──▶ GameMachine     │          │     GameMachine ◀── actions  │
//! │                  │           │          │          │                   │
//! │                  ▼           │          │          ▼                   │
//! │              RoomPatch ──────┼────┐ ┌───┼───── RoomPatch               │
//! │                              │    │ │   │                              │
//! │  LocalProjection ◀── poll ◀──┼──┐ │ │ ┌─┼──▶ poll ──▶ LocalProjection  │
//! └──────────────────────────────┘  │ ▼ ▼ │ └──────────────────────────────┘
//!                                 ┌─┴─────┴─┐
//!                                 │RoomStore│  rooms/{code}
//!                                 └─────────┘
//! ```
//!
//! The store holds the only authoritative copy of a room. Sessions never
//! edit their local view directly; every change goes out as a patch and
//! comes back as a snapshot.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hand_cricket_sync::state::{
//!     machine::{GameMachine, RoomEvent},
//!     room::{Room, RoomId},
//! };
//!
//! let machine = GameMachine::default();
//! let room = Room::new(RoomId::parse("ABC123")?, "Asha".into());
//! let (joined, transitions) = machine.reduce(&room, RoomEvent::GuestJoined { name: "Ben".into() })?;
//! ```

pub mod config;
pub mod error;
pub mod machine;
pub mod patch;
pub mod projection;
pub mod resolution;
pub mod room;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::{
    GameConfig, DEFAULT_MAX_BALLS, DEFAULT_MAX_WICKETS, MAX_CHOICE, MIN_CHOICE, ROOM_CODE_LEN,
};
pub use error::{ConfigError, SessionError, StoreError, ValidationError};
pub use machine::{BatOrBowl, GameMachine, InvalidTransition, RoomEvent, Transition};
pub use patch::RoomPatch;
pub use projection::{LocalProjection, Notice, Scoreboard, Seat};
pub use resolution::{score_ball, BallOutcome, Resolution};
pub use room::{GameResult, GameState, Innings, Role, Room, RoomId};
pub use session::Session;
pub use store::{MemoryRoomStore, Precondition, RoomStore, SnapshotCallback, Subscription};
