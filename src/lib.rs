//! Hand Cricket Sync
//!
//! This crate provides the game and synchronization logic for two-player
//! hand cricket played over a shared room document.
//!
//! # Overview
//!
//! - **Room Document** - One record per room holding both players, scores,
//!   wickets, pending choices and the current phase.
//!
//! - **Game State Machine** - Waiting, toss, choice, batting/bowling and
//!   finished, with validated transitions and derived innings switches.
//!
//! - **Turn Resolution** - Either client may score a ready ball; a conditional
//!   update makes sure it is scored exactly once.
//!
//! - **Sessions** - One player's actions plus the snapshot loop that keeps the
//!   local view current.
//!
//! # Design Principles
//!
//! 1. **The store is the source of truth** - Local views change only when a
//!    snapshot arrives.
//!
//! 2. **State machines validate transitions** - Invalid moves are rejected
//!    before anything is written.
//!
//! 3. **No networking** - Any backend implementing [`RoomStore`] can carry
//!    the room; [`MemoryRoomStore`] runs both players in one process.
//!
//! 4. **Serialization-ready** - Rooms serialize to the camelCase document
//!    both clients share.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use hand_cricket_sync::{GameConfig, GameState, MemoryRoomStore, Session};
//!
//! let store = Arc::new(MemoryRoomStore::new());
//! let mut host = Session::new(store.clone(), GameConfig::default()).unwrap();
//! let mut guest = Session::new(store.clone(), GameConfig::default()).unwrap();
//!
//! let code = host.create_room("Asha").unwrap();
//! guest.join_room("Ben", code.as_str()).unwrap();
//!
//! host.poll();
//! guest.poll();
//! assert_eq!(host.phase(), Some(GameState::Toss));
//! assert_eq!(guest.phase(), Some(GameState::Toss));
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
