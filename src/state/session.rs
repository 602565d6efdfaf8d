//! Session controller.
//!
//! Turns one player's intent into room mutations and keeps the local
//! projection fed from the subscription. Actions check their preconditions
//! against the local projection and issue a conditional patch that only lands
//! if the store still agrees with that view. Their effect becomes visible only
//! when the resulting snapshot comes back through [`Session::poll`].
//!
//! # Flow
//!
//! ```text
//! action ──▶ validate locally ──▶ reduce ──▶ patch ──▶ update_if ──▶ RoomStore
//!                                                                       │
//!   Notice ◀── projection ◀── poll ◀── inbox ◀── snapshot ──────────────┘
//!                  │
//!                  └──▶ Resolution::compute ──▶ update_if ──▶ RoomStore
//! ```

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::GameConfig;
use super::error::{ConfigError, SessionError, StoreError, ValidationError};
use super::machine::{BatOrBowl, GameMachine, RoomEvent};
use super::patch::RoomPatch;
use super::projection::{LocalProjection, Notice, Scoreboard};
use super::resolution::Resolution;
use super::room::{GameState, Role, Room, RoomId};
use super::store::{Precondition, RoomStore, Subscription};

const LOG_TARGET: &str = "hand_cricket::session";

/// One player's connection to a room.
pub struct Session<S: RoomStore> {
    store: Arc<S>,
    machine: GameMachine,
    rng: StdRng,
    projection: LocalProjection,
    subscription: Option<Subscription>,
    /// Snapshots queued by the subscription callback
    inbox: Option<Receiver<Option<Room>>>,
}

impl<S: RoomStore> Session<S> {
    /// Session for `config`. Limits that leave no game to play are rejected.
    pub fn new(store: Arc<S>, config: GameConfig) -> Result<Self, ConfigError> {
        Self::with_rng(store, config, StdRng::from_entropy())
    }

    /// Session with a caller-supplied RNG for room codes and the toss.
    pub fn with_rng(
        store: Arc<S>,
        config: GameConfig,
        rng: StdRng,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            machine: GameMachine::new(config),
            rng,
            projection: LocalProjection::new(),
            subscription: None,
            inbox: None,
        })
    }

    pub fn config(&self) -> &GameConfig {
        self.machine.config()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn projection(&self) -> &LocalProjection {
        &self.projection
    }

    pub fn is_idle(&self) -> bool {
        self.projection.is_idle()
    }

    pub fn role(&self) -> Option<Role> {
        self.projection.role()
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.projection.room_id()
    }

    /// Latest observed room.
    pub fn room(&self) -> Option<&Room> {
        self.projection.room()
    }

    /// Phase from this player's seat.
    pub fn phase(&self) -> Option<GameState> {
        self.projection.phase()
    }

    pub fn scoreboard(&self) -> Option<Scoreboard> {
        self.projection.scoreboard(self.machine.config())
    }

    /// Open a new room and take the host seat.
    pub fn create_room(&mut self, player_name: &str) -> Result<RoomId, SessionError> {
        let name = validate_name(player_name)?;
        self.ensure_idle()?;

        let id = RoomId::generate(&mut self.rng, self.machine.config().room_code_len);
        let room = Room::new(id.clone(), name);
        self.store.write(&room)?;

        tracing::info!(target: LOG_TARGET, room = %id, "room created");
        self.enter(id.clone(), Role::Host);
        Ok(id)
    }

    /// Take the guest seat in an existing room.
    ///
    /// Reads the room first and fails closed if it is missing or taken. The
    /// seat itself is claimed with a conditional update, so of two racing
    /// joins only one lands.
    pub fn join_room(&mut self, player_name: &str, room_code: &str) -> Result<(), SessionError> {
        let name = validate_name(player_name)?;
        let id = RoomId::parse(room_code)?;
        self.ensure_idle()?;

        let room = match self.store.read(&id) {
            Ok(room) => room,
            Err(StoreError::NotFound(id)) => return Err(SessionError::RoomNotFound(id)),
            Err(err) => return Err(err.into()),
        };
        if room.guest_name.is_some() {
            return Err(SessionError::RoomFull(id));
        }

        let (joined, _) = self.machine.reduce(&room, RoomEvent::GuestJoined { name })?;
        let patch = RoomPatch::diff(&room, &joined).map_err(StoreError::from)?;
        match self.store.update_if(&id, &Precondition::vacant_seat(), &patch) {
            Ok(()) => {}
            Err(StoreError::ConditionFailed(id)) => return Err(SessionError::RoomFull(id)),
            Err(StoreError::NotFound(id)) => return Err(SessionError::RoomNotFound(id)),
            Err(err) => return Err(err.into()),
        }

        tracing::info!(target: LOG_TARGET, room = %id, "joined room");
        self.enter(id, Role::Guest);
        Ok(())
    }

    /// Draw the toss. Host only.
    ///
    /// A second draw before the first is observed loses to it and comes back
    /// as [`SessionError::StaleWriteRejected`].
    pub fn toss(&mut self) -> Result<Role, SessionError> {
        let (role, room) = self.seated()?;
        if role != Role::Host {
            return Err(ValidationError::NotHost.into());
        }
        expect_phase(&room, role, GameState::Toss)?;

        let winner = if self.rng.gen_bool(0.5) {
            Role::Host
        } else {
            Role::Guest
        };
        self.mutate(
            &room,
            RoomEvent::Toss { by: role, winner },
            Precondition::untossed(),
        )?;
        Ok(winner)
    }

    /// Bat or bowl first. Toss winner only, once per game.
    pub fn declare(&mut self, decision: BatOrBowl) -> Result<(), SessionError> {
        let (role, room) = self.seated()?;
        expect_phase(&room, role, GameState::Choice)?;
        if room.toss_winner != Some(role) {
            return Err(ValidationError::NotTossWinner.into());
        }
        self.mutate(
            &room,
            RoomEvent::Declare { by: role, decision },
            Precondition::undeclared(),
        )
    }

    /// Show a number for the pending ball.
    ///
    /// Rejected without a mutation unless the number is playable, a ball is
    /// in play from this seat's view, and this seat has not already chosen.
    /// The choice is bound to the ball this seat saw: if that ball was scored
    /// or the innings moved on meanwhile, it is dropped as
    /// [`SessionError::StaleWriteRejected`].
    pub fn submit_choice(&mut self, number: u8) -> Result<(), SessionError> {
        if !self.machine.config().is_valid_choice(number) {
            return Err(ValidationError::ChoiceOutOfRange(number).into());
        }
        let (role, room) = self.seated()?;
        let actual = room.phase_for(role);
        if !actual.is_in_play() {
            let expected = room
                .batting_team
                .map_or(GameState::Batting, |batting| {
                    GameState::in_play_for(role, batting)
                });
            return Err(ValidationError::WrongPhase { expected, actual }.into());
        }
        if room.choice_of(role).is_some() {
            return Err(ValidationError::ChoicePending.into());
        }
        self.mutate(
            &room,
            RoomEvent::Choose { by: role, number },
            Precondition::open_choice(&room, role),
        )
    }

    /// Start another game in the same room once the last one finished.
    ///
    /// Either player may restart; the update is conditional on the room still
    /// being finished, so a simultaneous restart from the other side loses
    /// quietly instead of wiping a toss already made.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        let (role, room) = self.seated()?;
        expect_phase(&room, role, GameState::Finished)?;
        self.mutate(
            &room,
            RoomEvent::Restart,
            Precondition::in_phase(GameState::Finished),
        )
    }

    /// Give up the seat and go idle.
    ///
    /// The host deletes the room. The guest empties the guest seat and sends
    /// the room back to waiting.
    pub fn leave(&mut self) -> Result<(), SessionError> {
        let seat = self
            .projection
            .seat()
            .cloned()
            .ok_or(ValidationError::NotInRoom)?;

        let result = match seat.role {
            Role::Host => self.store.remove(&seat.room_id).map_err(SessionError::from),
            Role::Guest => self.vacate_guest_seat(&seat.room_id),
        };

        tracing::info!(target: LOG_TARGET, room = %seat.room_id, role = %seat.role, "left room");
        self.teardown();
        result
    }

    /// Apply every queued snapshot in arrival order.
    ///
    /// After each snapshot the session scores a ready ball or applies a
    /// missing innings switch or result. Losing that race to the other
    /// client is expected and dropped.
    pub fn poll(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();

        while let Some(snapshot) = self.next_snapshot() {
            let observed = self.projection.observe(snapshot);
            let vanished = observed.contains(&Notice::RoomVanished);
            notices.extend(observed);

            if vanished {
                self.teardown();
                break;
            }
            self.drive();
        }

        notices
    }

    fn next_snapshot(&self) -> Option<Option<Room>> {
        self.inbox.as_ref()?.try_recv().ok()
    }

    /// Issue whatever follow-up the latest snapshot calls for.
    fn drive(&self) {
        let Some(room) = self.projection.room() else {
            return;
        };

        let result = match Resolution::compute(&self.machine, room) {
            Ok(Some(resolution)) => resolution.commit(self.store.as_ref()),
            Ok(None) => return,
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            if err.is_silent() {
                tracing::debug!(target: LOG_TARGET, room = %room.id, %err, "follow-up dropped");
            } else {
                tracing::warn!(target: LOG_TARGET, room = %room.id, %err, "follow-up failed");
            }
        }
    }

    /// Reduce `event` against the local view and write the difference.
    ///
    /// The write lands only while the store still matches `expected`; the
    /// local view may be behind the store.
    fn mutate(
        &self,
        room: &Room,
        event: RoomEvent,
        expected: Precondition,
    ) -> Result<(), SessionError> {
        let (next, transitions) = self.machine.reduce(room, event)?;
        let patch = RoomPatch::diff(room, &next).map_err(StoreError::from)?;

        match self.store.update_if(&room.id, &expected, &patch) {
            Ok(()) => {
                tracing::debug!(
                    target: LOG_TARGET,
                    room = %room.id,
                    ?transitions,
                    fields = patch.len(),
                    "mutation issued"
                );
                Ok(())
            }
            Err(StoreError::ConditionFailed(id)) => Err(SessionError::StaleWriteRejected(id)),
            Err(StoreError::NotFound(id)) => Err(SessionError::RoomVanished(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Empty the guest seat of the room as the store currently holds it.
    fn vacate_guest_seat(&self, id: &RoomId) -> Result<(), SessionError> {
        let room = match self.store.read(id) {
            Ok(room) => room,
            Err(StoreError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if room.guest_name.is_none() {
            return Ok(());
        }

        let (left, _) = self.machine.reduce(&room, RoomEvent::GuestLeft)?;
        let patch = RoomPatch::diff(&room, &left).map_err(StoreError::from)?;
        match self.store.update(id, &patch) {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Take a seat and start watching the room.
    fn enter(&mut self, id: RoomId, role: Role) {
        let (tx, rx) = mpsc::channel();
        let subscription = self.store.subscribe(
            &id,
            Box::new(move |snapshot| {
                let _ = tx.send(snapshot);
            }),
        );

        self.projection.attach(id, role);
        self.subscription = Some(subscription);
        self.inbox = Some(rx);
    }

    /// Stop watching and go idle.
    fn teardown(&mut self) {
        self.subscription = None;
        self.inbox = None;
        self.projection.detach();
    }

    fn ensure_idle(&self) -> Result<(), ValidationError> {
        match self.projection.room_id() {
            Some(id) => Err(ValidationError::AlreadyInRoom(id.clone())),
            None => Ok(()),
        }
    }

    /// This seat and the latest observed room.
    fn seated(&self) -> Result<(Role, Room), ValidationError> {
        let role = self.projection.role().ok_or(ValidationError::NotInRoom)?;
        let room = self
            .projection
            .room()
            .cloned()
            .ok_or(ValidationError::NotInRoom)?;
        Ok((role, room))
    }
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

fn expect_phase(room: &Room, role: Role, expected: GameState) -> Result<(), ValidationError> {
    let actual = room.phase_for(role);
    if actual != expected {
        return Err(ValidationError::WrongPhase { expected, actual });
    }
    Ok(())
}
