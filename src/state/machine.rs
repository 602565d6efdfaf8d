//! Room state machine.
//!
//! Pure transition logic: `(room, event) -> (room', transitions)`. The
//! reducer never touches the store; the session turns its output into a
//! patch.
//!
//! # State Diagram
//!
//! ```text
//! ┌─────────┐ guest joins ┌──────┐ host tosses ┌────────┐
//! │ Waiting │────────────▶│ Toss │────────────▶│ Choice │
//! └─────────┘             └──────┘             └───┬────┘
//!      ▲                      ▲                    │ winner declares
//!      │ guest leaves         │ restart            ▼
//!      │ (from any phase)     │          ┌───────────────────┐
//!      │                 ┌────┴─────┐    │ Batting / Bowling │◀─┐
//!      └─────────────────│ Finished │◀───│   (first innings) │  │ innings
//!                        └──────────┘    │   (second innings)│──┘ switch
//!                              ▲         └─────────┬─────────┘
//!                              └───────────────────┘
//!                         second innings over or chase complete
//! ```
//!
//! Innings switches and game completion are *derived*: they are not events
//! anyone sends, they follow from the scoreboard. [`GameMachine::settle`]
//! applies them until nothing more fires.

use thiserror::Error;

use super::config::GameConfig;
use super::resolution::{self, BallOutcome};
use super::room::{GameResult, GameState, Innings, Role, Room};

/// Toss winner's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatOrBowl {
    Bat,
    Bowl,
}

/// Something a player does to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    GuestJoined { name: String },
    GuestLeft,
    /// Only the host draws the coin.
    Toss { by: Role, winner: Role },
    Declare { by: Role, decision: BatOrBowl },
    Choose { by: Role, number: u8 },
    /// Score the ball once both choices are in.
    ResolveBall,
    Restart,
}

/// What a reduction changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    GuestJoined,
    GuestLeft,
    TossWon(Role),
    InningsStarted { batting: Role },
    ChoiceRecorded(Role),
    BallResolved { batting: Role, outcome: BallOutcome },
    InningsSwitched { batting: Role, target: u32 },
    GameFinished(GameResult),
    Restarted,
}

/// Error when an event does not apply to the room's phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition from {from} via {event:?}: {reason}")]
pub struct InvalidTransition {
    pub from: GameState,
    pub event: RoomEvent,
    pub reason: &'static str,
}

/// Transition rules for one game configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameMachine {
    config: GameConfig,
}

impl GameMachine {
    pub fn new(config: GameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Apply an event, then settle derived transitions.
    pub fn reduce(
        &self,
        room: &Room,
        event: RoomEvent,
    ) -> Result<(Room, Vec<Transition>), InvalidTransition> {
        let mut next = room.clone();
        let mut transitions = vec![self.transition(&mut next, &event)?];

        while let Some(derived) = self.derive(&mut next) {
            transitions.push(derived);
        }

        next.touch();
        Ok((next, transitions))
    }

    /// Apply derived transitions until a fixed point.
    ///
    /// Returns the room unchanged (and no transitions) when it is settled.
    pub fn settle(&self, room: &Room) -> (Room, Vec<Transition>) {
        let mut next = room.clone();
        let mut transitions = Vec::new();

        while let Some(derived) = self.derive(&mut next) {
            transitions.push(derived);
        }

        if !transitions.is_empty() {
            next.touch();
        }
        (next, transitions)
    }

    /// Apply one explicit event in place.
    fn transition(
        &self,
        room: &mut Room,
        event: &RoomEvent,
    ) -> Result<Transition, InvalidTransition> {
        use GameState::{Batting, Bowling, Choice, Finished, Waiting};
        use RoomEvent::*;

        let from = room.game_state;
        let invalid = |reason: &'static str| InvalidTransition {
            from,
            event: event.clone(),
            reason,
        };

        match (from, event) {
            // GuestJoined: Waiting -> Toss
            (Waiting, GuestJoined { .. }) if room.guest_name.is_some() => {
                Err(invalid("Room already has a guest"))
            }
            (Waiting, GuestJoined { name }) if name.trim().is_empty() => {
                Err(invalid("Guest name is empty"))
            }
            (Waiting, GuestJoined { name }) => {
                room.guest_name = Some(name.trim().to_string());
                room.game_state = GameState::Toss;
                Ok(Transition::GuestJoined)
            }
            (_, GuestJoined { .. }) => Err(invalid("Room is not waiting for a guest")),

            // GuestLeft: Any -> Waiting, game wiped
            (_, GuestLeft) if room.guest_name.is_none() => Err(invalid("No guest to remove")),
            (_, GuestLeft) => {
                room.guest_name = None;
                room.reset_game();
                room.game_state = Waiting;
                Ok(Transition::GuestLeft)
            }

            // Toss: Toss -> Choice, host only, once per game
            (GameState::Toss, Toss { by: Role::Guest, .. }) => {
                Err(invalid("Only the host executes the toss"))
            }
            (GameState::Toss, Toss { .. }) if room.toss_winner.is_some() => {
                Err(invalid("Toss already decided"))
            }
            (GameState::Toss, Toss { winner, .. }) => {
                room.toss_winner = Some(*winner);
                room.game_state = Choice;
                Ok(Transition::TossWon(*winner))
            }
            (_, Toss { .. }) => Err(invalid("Not time for the toss")),

            // Declare: Choice -> Batting/Bowling, toss winner only
            (Choice, Declare { by, .. }) if room.toss_winner != Some(*by) => {
                Err(invalid("Only the toss winner declares"))
            }
            (Choice, Declare { by, decision }) => {
                let batting = match decision {
                    BatOrBowl::Bat => *by,
                    BatOrBowl::Bowl => by.opponent(),
                };
                room.batting_team = Some(batting);
                room.game_state = GameState::in_play_for(Role::Host, batting);
                Ok(Transition::InningsStarted { batting })
            }
            (_, Declare { .. }) => Err(invalid("Not time to choose bat or bowl")),

            // Choose: record one side's number for the pending ball
            (Batting | Bowling, Choose { number, .. })
                if !self.config.is_valid_choice(*number) =>
            {
                Err(invalid("Choice must be between 1 and 6"))
            }
            (Batting | Bowling, Choose { by, .. }) if room.choice_of(*by).is_some() => {
                Err(invalid("Choice already pending for this ball"))
            }
            (Batting | Bowling, Choose { by, number }) => {
                room.set_choice(*by, Some(*number));
                Ok(Transition::ChoiceRecorded(*by))
            }
            (_, Choose { .. }) => Err(invalid("No ball in play")),

            // ResolveBall: score the pending ball
            (Batting | Bowling, ResolveBall)
                if room.innings_over(&self.config) || room.chase_complete() =>
            {
                Err(invalid("Innings already complete"))
            }
            (Batting | Bowling, ResolveBall) => {
                let batting = room
                    .batting_team
                    .ok_or_else(|| invalid("No side at the crease"))?;
                let outcome = resolution::apply_ball(room, batting)
                    .ok_or_else(|| invalid("Both choices are required"))?;
                Ok(Transition::BallResolved { batting, outcome })
            }
            (_, ResolveBall) => Err(invalid("No ball in play")),

            // Restart: Finished -> Toss
            (Finished, Restart) => {
                room.reset_game();
                room.game_state = GameState::Toss;
                Ok(Transition::Restarted)
            }
            (_, Restart) => Err(invalid("Restart is only permitted once the game is finished")),
        }
    }

    /// Apply the next derived transition, if one is due.
    fn derive(&self, room: &mut Room) -> Option<Transition> {
        if !room.game_state.is_in_play() {
            return None;
        }
        let batting = room.batting_team?;

        match room.innings_state {
            Innings::Second if room.chase_complete() || room.innings_over(&self.config) => {
                Some(finish(room))
            }
            Innings::First if room.innings_over(&self.config) => {
                let target = room.score_of(batting) + 1;
                let next = batting.opponent();
                room.innings_state = Innings::Second;
                room.batting_team = Some(next);
                room.current_balls = 0;
                room.host_choice = None;
                room.guest_choice = None;
                room.target = Some(target);
                room.game_state = GameState::in_play_for(Role::Host, next);
                Some(Transition::InningsSwitched {
                    batting: next,
                    target,
                })
            }
            _ => None,
        }
    }
}

/// Record the result. Decided on runs alone, however the innings ended.
fn finish(room: &mut Room) -> Transition {
    let result = GameResult::from_scores(room.host_score, room.guest_score);
    room.host_choice = None;
    room.guest_choice = None;
    room.game_result = Some(result);
    room.game_state = GameState::Finished;
    Transition::GameFinished(result)
}
