//! Ball resolution.
//!
//! Once a snapshot shows both choices, either client may score the ball.
//! Both will usually try. A [`Resolution`] is computed from exactly one
//! snapshot and committed as a conditional update guarded by that snapshot's
//! ball clock (both choices, ball count, innings). The first commit wins and
//! clears the choices; the second finds the clock moved and is dropped.
//!
//! Innings switches and game completion that follow from the ball are folded
//! into the same patch, so the room is never observed half-settled.

use super::error::{SessionError, StoreError};
use super::machine::{GameMachine, RoomEvent, Transition};
use super::patch::RoomPatch;
use super::room::{Role, Room};
use super::store::{Precondition, RoomStore};

const LOG_TARGET: &str = "hand_cricket::resolution";

/// What one ball did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallOutcome {
    /// Batter and bowler showed the same number
    Wicket,
    /// Batter's own number, added to the batting side's score
    Runs(u8),
}

impl BallOutcome {
    pub fn is_wicket(&self) -> bool {
        matches!(self, Self::Wicket)
    }

    pub fn runs(&self) -> u8 {
        match self {
            Self::Wicket => 0,
            Self::Runs(runs) => *runs,
        }
    }
}

/// Compare the two numbers shown for a ball.
pub fn score_ball(batting_choice: u8, bowling_choice: u8) -> BallOutcome {
    if batting_choice == bowling_choice {
        BallOutcome::Wicket
    } else {
        BallOutcome::Runs(batting_choice)
    }
}

/// Score the pending ball into `room` and clear both choices.
///
/// Returns `None`, leaving the room alone, unless both choices are present.
pub(crate) fn apply_ball(room: &mut Room, batting: Role) -> Option<BallOutcome> {
    let batting_choice = room.choice_of(batting)?;
    let bowling_choice = room.choice_of(batting.opponent())?;
    let outcome = score_ball(batting_choice, bowling_choice);

    match outcome {
        BallOutcome::Wicket => room.add_wicket(batting),
        BallOutcome::Runs(runs) => room.add_runs(batting, u32::from(runs)),
    }
    room.current_balls += 1;
    room.host_choice = None;
    room.guest_choice = None;

    Some(outcome)
}

/// A follow-up write computed from one observed snapshot.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Fields the store must still hold for the commit to apply
    pub precondition: Precondition,

    /// Set when a ball was scored; `None` for a settle-only follow-up
    pub outcome: Option<BallOutcome>,

    pub transitions: Vec<Transition>,

    /// The room as it will read after the commit
    pub resolved: Room,

    pub patch: RoomPatch,
}

impl Resolution {
    /// Work out what `snapshot` requires, if anything.
    ///
    /// Both choices present in an open innings: score the ball and settle.
    /// Otherwise apply any innings switch or result the snapshot is missing. A settled snapshot
    /// with a choice still outstanding needs nothing.
    pub fn compute(machine: &GameMachine, snapshot: &Room) -> Result<Option<Self>, SessionError> {
        if !snapshot.game_state.is_in_play() {
            return Ok(None);
        }

        let closed = snapshot.innings_over(machine.config()) || snapshot.chase_complete();
        let (resolved, transitions) = if snapshot.both_choices().is_some() && !closed {
            machine.reduce(snapshot, RoomEvent::ResolveBall)?
        } else {
            machine.settle(snapshot)
        };
        if transitions.is_empty() {
            return Ok(None);
        }

        let outcome = transitions.iter().find_map(|t| match t {
            Transition::BallResolved { outcome, .. } => Some(*outcome),
            _ => None,
        });
        let patch = RoomPatch::diff(snapshot, &resolved).map_err(StoreError::from)?;

        Ok(Some(Self {
            precondition: Precondition::ball_clock(snapshot),
            outcome,
            transitions,
            resolved,
            patch,
        }))
    }

    /// Conditionally write the resolution.
    ///
    /// Losing the race yields [`SessionError::StaleWriteRejected`]; callers
    /// drop it rather than retry, since the winner already moved the room on.
    pub fn commit<S: RoomStore + ?Sized>(&self, store: &S) -> Result<(), SessionError> {
        let id = &self.resolved.id;
        match store.update_if(id, &self.precondition, &self.patch) {
            Ok(()) => {
                tracing::debug!(
                    target: LOG_TARGET,
                    room = %id,
                    outcome = ?self.outcome,
                    fields = self.patch.len(),
                    "resolution committed"
                );
                for transition in &self.transitions {
                    match transition {
                        Transition::InningsSwitched { batting, target } => {
                            tracing::info!(
                                target: LOG_TARGET,
                                room = %id,
                                %batting,
                                runs_needed = *target,
                                "innings switched"
                            );
                        }
                        Transition::GameFinished(result) => {
                            tracing::info!(target: LOG_TARGET, room = %id, %result, "game finished");
                        }
                        _ => {}
                    }
                }
                Ok(())
            }
            Err(StoreError::ConditionFailed(id)) => {
                tracing::debug!(target: LOG_TARGET, room = %id, "resolution lost the race");
                Err(SessionError::StaleWriteRejected(id))
            }
            Err(StoreError::NotFound(id)) => Err(SessionError::RoomVanished(id)),
            Err(err) => Err(err.into()),
        }
    }
}
