//! Game limits.
//!
//! Every component that evaluates an innings limit takes a [`GameConfig`]
//! explicitly; nothing reads these constants behind the caller's back.

use super::error::ConfigError;

/// Balls per innings.
pub const DEFAULT_MAX_BALLS: u8 = 12;

/// Wickets per innings.
pub const DEFAULT_MAX_WICKETS: u8 = 2;

/// Length of a generated room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Smallest number a player may show.
pub const MIN_CHOICE: u8 = 1;

/// Largest number a player may show.
pub const MAX_CHOICE: u8 = 6;

/// Limits for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Balls bowled before an innings closes
    pub max_balls: u8,

    /// Dismissals before an innings closes
    pub max_wickets: u8,

    /// Characters in a freshly generated room code
    pub room_code_len: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_balls: DEFAULT_MAX_BALLS,
            max_wickets: DEFAULT_MAX_WICKETS,
            room_code_len: ROOM_CODE_LEN,
        }
    }
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_balls(mut self, max_balls: u8) -> Self {
        self.max_balls = max_balls;
        self
    }

    pub fn with_max_wickets(mut self, max_wickets: u8) -> Self {
        self.max_wickets = max_wickets;
        self
    }

    pub fn with_room_code_len(mut self, room_code_len: usize) -> Self {
        self.room_code_len = room_code_len;
        self
    }

    /// Reject limits that would make a game unplayable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_balls == 0 {
            return Err(ConfigError::ZeroBalls);
        }
        if self.max_wickets == 0 {
            return Err(ConfigError::ZeroWickets);
        }
        if self.room_code_len == 0 {
            return Err(ConfigError::ZeroRoomCodeLen);
        }
        Ok(())
    }

    /// Check if a shown number is playable.
    pub fn is_valid_choice(&self, number: u8) -> bool {
        (MIN_CHOICE..=MAX_CHOICE).contains(&number)
    }
}
