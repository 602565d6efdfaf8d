//! The shared room document.
//!
//! A [`Room`] is the single record both players read and write. Its JSON
//! shape (camelCase keys, absent optional fields omitted, lowercase enum
//! values) is what travels through the store.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::GameConfig;
use super::error::ValidationError;

/// Characters a generated room code is drawn from.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Which seat a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Created the room
    Host,
    /// Joined with the room code
    Guest,
}

impl Role {
    pub fn opponent(self) -> Self {
        match self {
            Self::Host => Self::Guest,
            Self::Guest => Self::Host,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room phase as stored in the document.
///
/// `Batting` and `Bowling` are written from the host's point of view; use
/// [`Room::phase_for`] to get the phase a particular seat is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    /// Host alone in the room
    #[default]
    Waiting,
    /// Both seated, coin not yet tossed
    Toss,
    /// Toss winner deciding to bat or bowl
    Choice,
    Batting,
    Bowling,
    /// Result recorded
    Finished,
}

impl GameState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Toss => "toss",
            Self::Choice => "choice",
            Self::Batting => "batting",
            Self::Bowling => "bowling",
            Self::Finished => "finished",
        }
    }

    /// Check if balls are being bowled.
    pub fn is_in_play(&self) -> bool {
        matches!(self, Self::Batting | Self::Bowling)
    }

    /// The in-play phase `viewer` sees while `batting` is at the crease.
    pub fn in_play_for(viewer: Role, batting: Role) -> Self {
        if viewer == batting {
            Self::Batting
        } else {
            Self::Bowling
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which innings is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Innings {
    #[default]
    First,
    Second,
}

/// Terminal outcome of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Host,
    Guest,
    Tie,
}

impl GameResult {
    /// Decide purely on runs. Equal scores are a tie; there is no super over.
    pub fn from_scores(host_score: u32, guest_score: u32) -> Self {
        use std::cmp::Ordering;

        match host_score.cmp(&guest_score) {
            Ordering::Greater => Self::Host,
            Ordering::Less => Self::Guest,
            Ordering::Equal => Self::Tie,
        }
    }

    pub fn winner(&self) -> Option<Role> {
        match self {
            Self::Host => Some(Role::Host),
            Self::Guest => Some(Role::Guest),
            Self::Tie => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Guest => "guest",
            Self::Tie => "tie",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "Host wins!"),
            Self::Guest => write!(f, "Guest wins!"),
            Self::Tie => write!(f, "It's a tie!"),
        }
    }
}

/// Short uppercase alphanumeric room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Parse a user-typed code. Surrounding whitespace is dropped and letters
    /// are uppercased.
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::EmptyRoomCode);
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::MalformedRoomCode(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Draw a fresh code. Uniqueness against existing rooms is not checked.
    pub fn generate<R: Rng>(rng: &mut R, len: usize) -> Self {
        let code = (0..len)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The shared game document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Immutable after creation
    pub id: RoomId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,

    /// Absent until someone joins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,

    pub game_state: GameState,

    pub innings_state: Innings,

    /// Set once per game
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toss_winner: Option<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batting_team: Option<Role>,

    pub host_score: u32,
    pub guest_score: u32,
    pub host_wickets: u8,
    pub guest_wickets: u8,

    /// Balls bowled in the current innings
    pub current_balls: u8,

    /// Pending selection for the current ball
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_choice: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_choice: Option<u8>,

    /// Runs the chasing side needs; second innings only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_result: Option<GameResult>,

    /// Ordering diagnostics only
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl Room {
    /// A fresh room waiting for a guest.
    pub fn new(id: RoomId, host_name: String) -> Self {
        Self {
            id,
            host_name: Some(host_name),
            guest_name: None,
            game_state: GameState::Waiting,
            innings_state: Innings::First,
            toss_winner: None,
            batting_team: None,
            host_score: 0,
            guest_score: 0,
            host_wickets: 0,
            guest_wickets: 0,
            current_balls: 0,
            host_choice: None,
            guest_choice: None,
            target: None,
            game_result: None,
            last_updated: now_millis(),
        }
    }

    /// Advance `last_updated` without ever moving it backwards.
    pub fn touch(&mut self) {
        self.last_updated = self.last_updated.max(now_millis());
    }

    /// Clear every per-game field. Identity and names survive.
    pub fn reset_game(&mut self) {
        self.innings_state = Innings::First;
        self.toss_winner = None;
        self.batting_team = None;
        self.host_score = 0;
        self.guest_score = 0;
        self.host_wickets = 0;
        self.guest_wickets = 0;
        self.current_balls = 0;
        self.host_choice = None;
        self.guest_choice = None;
        self.target = None;
        self.game_result = None;
    }

    pub fn name_of(&self, role: Role) -> Option<&str> {
        match role {
            Role::Host => self.host_name.as_deref(),
            Role::Guest => self.guest_name.as_deref(),
        }
    }

    pub fn score_of(&self, role: Role) -> u32 {
        match role {
            Role::Host => self.host_score,
            Role::Guest => self.guest_score,
        }
    }

    pub fn wickets_of(&self, role: Role) -> u8 {
        match role {
            Role::Host => self.host_wickets,
            Role::Guest => self.guest_wickets,
        }
    }

    pub fn choice_of(&self, role: Role) -> Option<u8> {
        match role {
            Role::Host => self.host_choice,
            Role::Guest => self.guest_choice,
        }
    }

    pub(crate) fn set_choice(&mut self, role: Role, choice: Option<u8>) {
        match role {
            Role::Host => self.host_choice = choice,
            Role::Guest => self.guest_choice = choice,
        }
    }

    pub(crate) fn add_runs(&mut self, role: Role, runs: u32) {
        match role {
            Role::Host => self.host_score += runs,
            Role::Guest => self.guest_score += runs,
        }
    }

    pub(crate) fn add_wicket(&mut self, role: Role) {
        match role {
            Role::Host => self.host_wickets += 1,
            Role::Guest => self.guest_wickets += 1,
        }
    }

    /// Both pending choices, as `(host, guest)`, once both are in.
    pub fn both_choices(&self) -> Option<(u8, u8)> {
        Some((self.host_choice?, self.guest_choice?))
    }

    pub fn batting_score(&self) -> Option<u32> {
        self.batting_team.map(|role| self.score_of(role))
    }

    pub fn batting_wickets(&self) -> Option<u8> {
        self.batting_team.map(|role| self.wickets_of(role))
    }

    /// The phase `role` is in. In-play phases are relative to the seat.
    pub fn phase_for(&self, role: Role) -> GameState {
        match (self.game_state, self.batting_team) {
            (state, Some(batting)) if state.is_in_play() => GameState::in_play_for(role, batting),
            (state, _) => state,
        }
    }

    /// Check if balls or wickets are exhausted for the side at the crease.
    pub fn innings_over(&self, config: &GameConfig) -> bool {
        self.current_balls >= config.max_balls
            || self
                .batting_wickets()
                .is_some_and(|wickets| wickets >= config.max_wickets)
    }

    /// Check if the chasing side has reached its target.
    pub fn chase_complete(&self) -> bool {
        self.innings_state == Innings::Second
            && matches!(
                (self.batting_score(), self.target),
                (Some(score), Some(target)) if score >= target
            )
    }

    /// Runs still needed in the chase.
    pub fn remaining_runs(&self) -> Option<u32> {
        let target = self.target?;
        let score = self.batting_score()?;
        Some(target.saturating_sub(score))
    }

    pub fn remaining_balls(&self, config: &GameConfig) -> u8 {
        config.max_balls.saturating_sub(self.current_balls)
    }

    /// Check if the room is waiting on `role` to act.
    pub fn awaits(&self, role: Role) -> bool {
        match self.game_state {
            GameState::Toss => role == Role::Host && self.toss_winner.is_none(),
            GameState::Choice => self.toss_winner == Some(role),
            GameState::Batting | GameState::Bowling => self.choice_of(role).is_none(),
            GameState::Waiting | GameState::Finished => false,
        }
    }

    /// Check the document-level invariants.
    pub fn check(&self, config: &GameConfig) -> Result<(), ValidationError> {
        let fail = |reason: &'static str| Err(ValidationError::InvalidRoom(reason));

        if self.current_balls > config.max_balls {
            return fail("ball count exceeds the innings limit");
        }
        if self.host_wickets > config.max_wickets || self.guest_wickets > config.max_wickets {
            return fail("wicket count exceeds the innings limit");
        }
        let choices = [self.host_choice, self.guest_choice];
        if choices.iter().flatten().any(|n| !config.is_valid_choice(*n)) {
            return fail("pending choice out of range");
        }
        if self.target.is_some() != (self.innings_state == Innings::Second) {
            return fail("target is set exactly during the second innings");
        }
        if self.game_result.is_some() != (self.game_state == GameState::Finished) {
            return fail("result is set exactly when the game is finished");
        }
        if self.guest_name.is_none() && self.game_state != GameState::Waiting {
            return fail("a room without a guest must be waiting");
        }
        if self.game_state.is_in_play() && self.batting_team.is_none() {
            return fail("play requires a batting side");
        }
        if matches!(self.game_state, GameState::Choice) && self.toss_winner.is_none() {
            return fail("choice phase requires a toss winner");
        }
        Ok(())
    }
}

/// Current time at the document's millisecond precision.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn in_play_room() -> Room {
        let mut room = Room::new(RoomId::parse("ABC123").unwrap(), "Asha".to_string());
        room.guest_name = Some("Ben".to_string());
        room.toss_winner = Some(Role::Guest);
        room.batting_team = Some(Role::Guest);
        room.game_state = GameState::Bowling;
        room
    }

    #[test]
    fn test_room_new() {
        let room = Room::new(RoomId::parse("abc123").unwrap(), "Asha".to_string());
        assert_eq!(room.id.as_str(), "ABC123");
        assert_eq!(room.game_state, GameState::Waiting);
        assert_eq!(room.innings_state, Innings::First);
        assert!(room.guest_name.is_none());
        assert!(room.check(&GameConfig::default()).is_ok());
    }

    #[test]
    fn test_room_id_parse() {
        assert_eq!(RoomId::parse("  xy12zq ").unwrap().as_str(), "XY12ZQ");
        assert_eq!(RoomId::parse(""), Err(ValidationError::EmptyRoomCode));
        assert!(matches!(
            RoomId::parse("AB-12"),
            Err(ValidationError::MalformedRoomCode(_))
        ));
    }

    #[test]
    fn test_room_id_generate() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = RoomId::generate(&mut rng, 6);
        assert_eq!(id.as_str().len(), 6);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_phase_for_is_relative() {
        let room = in_play_room();
        assert_eq!(room.phase_for(Role::Guest), GameState::Batting);
        assert_eq!(room.phase_for(Role::Host), GameState::Bowling);
    }

    #[test]
    fn test_json_shape() {
        let mut room = Room::new(RoomId::parse("ABC123").unwrap(), "Asha".to_string());
        room.host_choice = Some(4);
        let json = serde_json::to_value(&room).unwrap();

        assert_eq!(json["id"], "ABC123");
        assert_eq!(json["hostName"], "Asha");
        assert_eq!(json["gameState"], "waiting");
        assert_eq!(json["inningsState"], "first");
        assert_eq!(json["hostChoice"], 4);
        assert!(json.get("guestName").is_none());
        assert!(json.get("guestChoice").is_none());
        assert!(json["lastUpdated"].is_i64());

        let back: Room = serde_json::from_value(json).unwrap();
        assert_eq!(back, room);
    }

    #[test]
    fn test_innings_over() {
        let config = GameConfig::default();
        let mut room = in_play_room();
        assert!(!room.innings_over(&config));

        room.current_balls = 12;
        assert!(room.innings_over(&config));

        room.current_balls = 3;
        room.guest_wickets = 2;
        assert!(room.innings_over(&config));
    }

    #[test]
    fn test_chase_complete_and_remaining_runs() {
        let mut room = in_play_room();
        room.innings_state = Innings::Second;
        room.target = Some(9);
        room.guest_score = 5;
        assert!(!room.chase_complete());
        assert_eq!(room.remaining_runs(), Some(4));

        room.guest_score = 11;
        assert!(room.chase_complete());
        assert_eq!(room.remaining_runs(), Some(0));
    }

    #[test]
    fn test_result_from_scores() {
        assert_eq!(GameResult::from_scores(10, 4), GameResult::Host);
        assert_eq!(GameResult::from_scores(4, 10), GameResult::Guest);
        assert_eq!(GameResult::from_scores(7, 7), GameResult::Tie);
        assert_eq!(GameResult::Tie.winner(), None);
        assert_eq!(GameResult::Tie.to_string(), "It's a tie!");
    }

    #[test]
    fn test_awaits() {
        let mut room = in_play_room();
        assert!(room.awaits(Role::Host));
        assert!(room.awaits(Role::Guest));

        room.host_choice = Some(2);
        assert!(!room.awaits(Role::Host));
        assert!(room.awaits(Role::Guest));

        room.game_state = GameState::Toss;
        room.toss_winner = None;
        assert!(room.awaits(Role::Host));
        assert!(!room.awaits(Role::Guest));
    }

    #[test]
    fn test_check_flags_target_in_first_innings() {
        let mut room = in_play_room();
        room.target = Some(5);
        assert_eq!(
            room.check(&GameConfig::default()),
            Err(ValidationError::InvalidRoom(
                "target is set exactly during the second innings"
            ))
        );
    }
}
