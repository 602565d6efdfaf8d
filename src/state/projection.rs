//! Local projection of the shared room.
//!
//! Each client mirrors the room only by applying the snapshots its
//! subscription delivers. Comparing consecutive snapshots yields the
//! [`Notice`]s a presentation layer shows: phase changes, balls, innings
//! switches, results, and the room disappearing.

use super::config::GameConfig;
use super::resolution::BallOutcome;
use super::room::{GameResult, GameState, Innings, Role, Room, RoomId};

const LOG_TARGET: &str = "hand_cricket::projection";

/// A change the local player should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// First snapshot after taking a seat
    Entered { phase: GameState },
    PhaseChanged { from: GameState, to: GameState },
    OpponentJoined { name: String },
    OpponentLeft,
    BallResolved { batting: Role, outcome: BallOutcome },
    InningsSwitched { batting: Role, target: u32 },
    GameFinished(GameResult),
    /// The room was deleted; the session is over
    RoomVanished,
}

/// Which room and seat this client holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub room_id: RoomId,
    pub role: Role,
}

/// This client's mirror of the room.
#[derive(Debug, Clone, Default)]
pub struct LocalProjection {
    seat: Option<Seat>,
    room: Option<Room>,
    snapshots: u64,
}

impl LocalProjection {
    /// An idle projection, not seated anywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a seat. The room itself arrives with the first snapshot.
    pub fn attach(&mut self, room_id: RoomId, role: Role) {
        self.seat = Some(Seat { room_id, role });
        self.room = None;
        self.snapshots = 0;
    }

    /// Back to idle.
    pub fn detach(&mut self) {
        *self = Self::default();
    }

    pub fn is_idle(&self) -> bool {
        self.seat.is_none()
    }

    pub fn seat(&self) -> Option<&Seat> {
        self.seat.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.seat.as_ref().map(|s| s.role)
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.seat.as_ref().map(|s| &s.room_id)
    }

    /// Latest observed room.
    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    /// Phase from this seat's point of view.
    pub fn phase(&self) -> Option<GameState> {
        Some(self.room.as_ref()?.phase_for(self.role()?))
    }

    pub fn snapshots_seen(&self) -> u64 {
        self.snapshots
    }

    /// Apply one delivered snapshot.
    pub fn observe(&mut self, snapshot: Option<Room>) -> Vec<Notice> {
        let Some(seat) = self.seat.clone() else {
            return Vec::new();
        };

        let Some(room) = snapshot else {
            tracing::warn!(target: LOG_TARGET, room = %seat.room_id, "room vanished");
            return vec![Notice::RoomVanished];
        };

        if room.id != seat.room_id {
            tracing::warn!(
                target: LOG_TARGET,
                expected = %seat.room_id,
                got = %room.id,
                "snapshot for another room ignored"
            );
            return Vec::new();
        }

        let notices = match &self.room {
            None => vec![Notice::Entered {
                phase: room.phase_for(seat.role),
            }],
            Some(previous) => {
                if room.last_updated < previous.last_updated {
                    tracing::warn!(
                        target: LOG_TARGET,
                        room = %room.id,
                        previous = %previous.last_updated,
                        current = %room.last_updated,
                        "lastUpdated moved backwards"
                    );
                }
                changes(previous, &room, seat.role)
            }
        };

        self.snapshots += 1;
        self.room = Some(room);
        notices
    }

    /// Derived view for presentation.
    pub fn scoreboard(&self, config: &GameConfig) -> Option<Scoreboard> {
        let role = self.role()?;
        let room = self.room.as_ref()?;
        let opponent = role.opponent();

        Some(Scoreboard {
            room_id: room.id.clone(),
            role,
            phase: room.phase_for(role),
            player_name: room.name_of(role).map(str::to_string),
            opponent_name: room.name_of(opponent).map(str::to_string),
            innings: room.innings_state,
            batting_team: room.batting_team,
            host_score: room.host_score,
            guest_score: room.guest_score,
            host_wickets: room.host_wickets,
            guest_wickets: room.guest_wickets,
            current_balls: room.current_balls,
            remaining_balls: room.remaining_balls(config),
            target: room.target,
            remaining_runs: room.remaining_runs(),
            my_choice: room.choice_of(role),
            opponent_ready: room.choice_of(opponent).is_some(),
            is_my_turn: room.awaits(role),
            result: room.game_result,
        })
    }
}

/// Notices implied by moving from `previous` to `current`, seen from `role`.
fn changes(previous: &Room, current: &Room, role: Role) -> Vec<Notice> {
    let mut notices = Vec::new();
    let opponent = role.opponent();

    let (from, to) = (previous.phase_for(role), current.phase_for(role));
    if from != to {
        notices.push(Notice::PhaseChanged { from, to });
    }

    match (previous.name_of(opponent), current.name_of(opponent)) {
        (None, Some(name)) => notices.push(Notice::OpponentJoined {
            name: name.to_string(),
        }),
        (Some(_), None) => notices.push(Notice::OpponentLeft),
        _ => {}
    }

    if let Some(notice) = ball_change(previous, current) {
        notices.push(notice);
    }

    if previous.innings_state == Innings::First && current.innings_state == Innings::Second {
        if let (Some(batting), Some(target)) = (current.batting_team, current.target) {
            notices.push(Notice::InningsSwitched { batting, target });
        }
    }

    if previous.game_state != GameState::Finished && current.game_state == GameState::Finished {
        if let Some(result) = current.game_result {
            notices.push(Notice::GameFinished(result));
        }
    }

    notices
}

/// The ball scored between two snapshots of the same game, if any.
fn ball_change(previous: &Room, current: &Room) -> Option<Notice> {
    if !previous.game_state.is_in_play() {
        return None;
    }
    let continues = current.game_state.is_in_play() || current.game_state == GameState::Finished;
    if !continues || current.batting_team.is_none() {
        return None;
    }

    let batting = previous.batting_team?;
    let wickets = current
        .wickets_of(batting)
        .saturating_sub(previous.wickets_of(batting));
    let runs = current
        .score_of(batting)
        .saturating_sub(previous.score_of(batting));

    let outcome = if wickets > 0 {
        BallOutcome::Wicket
    } else if runs > 0 {
        BallOutcome::Runs(u8::try_from(runs).unwrap_or(u8::MAX))
    } else {
        return None;
    };
    Some(Notice::BallResolved { batting, outcome })
}

/// What a client shows for its seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoreboard {
    pub room_id: RoomId,
    pub role: Role,
    pub phase: GameState,
    pub player_name: Option<String>,
    pub opponent_name: Option<String>,
    pub innings: Innings,
    pub batting_team: Option<Role>,
    pub host_score: u32,
    pub guest_score: u32,
    pub host_wickets: u8,
    pub guest_wickets: u8,
    pub current_balls: u8,
    pub remaining_balls: u8,
    pub target: Option<u32>,
    /// Runs still needed in the chase
    pub remaining_runs: Option<u32>,
    /// This seat's pending number; the opponent's stays hidden
    pub my_choice: Option<u8>,
    pub opponent_ready: bool,
    pub is_my_turn: bool,
    pub result: Option<GameResult>,
}

impl Scoreboard {
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "room_id": self.room_id.as_str(),
            "role": self.role.as_str(),
            "phase": self.phase.as_str(),
            "player_name": self.player_name,
            "opponent_name": self.opponent_name,
            "innings": match self.innings {
                Innings::First => "first",
                Innings::Second => "second",
            },
            "batting_team": self.batting_team.map(|r| r.as_str()),
            "host_score": self.host_score,
            "guest_score": self.guest_score,
            "host_wickets": self.host_wickets,
            "guest_wickets": self.guest_wickets,
            "current_balls": self.current_balls,
            "remaining_balls": self.remaining_balls,
            "my_choice": self.my_choice,
            "opponent_ready": self.opponent_ready,
            "is_my_turn": self.is_my_turn
        });
        if let Some(target) = self.target {
            obj["target"] = serde_json::json!(target);
            obj["remaining_runs"] = serde_json::json!(self.remaining_runs);
        }
        if let Some(result) = &self.result {
            obj["result"] = serde_json::json!(result.as_str());
            obj["result_message"] = serde_json::json!(result.to_string());
        }
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn room_id() -> RoomId {
        RoomId::parse("PROJ01").unwrap()
    }

    fn waiting() -> Room {
        Room::new(room_id(), "Asha".to_string())
    }

    fn in_play() -> Room {
        let mut room = waiting();
        room.guest_name = Some("Ben".to_string());
        room.toss_winner = Some(Role::Host);
        room.batting_team = Some(Role::Host);
        room.game_state = GameState::Batting;
        room
    }

    #[test]
    fn test_idle_ignores_snapshots() {
        let mut projection = LocalProjection::new();
        assert!(projection.observe(Some(waiting())).is_empty());
        assert!(projection.room().is_none());
        assert!(projection.is_idle());
    }

    #[test]
    fn test_first_snapshot_enters() {
        let mut projection = LocalProjection::new();
        projection.attach(room_id(), Role::Host);

        let notices = projection.observe(Some(waiting()));
        assert_eq!(
            notices,
            vec![Notice::Entered {
                phase: GameState::Waiting
            }]
        );
        assert_eq!(projection.phase(), Some(GameState::Waiting));
        assert_eq!(projection.snapshots_seen(), 1);
    }

    #[test]
    fn test_opponent_join_and_leave() {
        let mut projection = LocalProjection::new();
        projection.attach(room_id(), Role::Host);
        projection.observe(Some(waiting()));

        let mut joined = waiting();
        joined.guest_name = Some("Ben".to_string());
        joined.game_state = GameState::Toss;
        let notices = projection.observe(Some(joined));
        assert_eq!(
            notices,
            vec![
                Notice::PhaseChanged {
                    from: GameState::Waiting,
                    to: GameState::Toss
                },
                Notice::OpponentJoined {
                    name: "Ben".to_string()
                },
            ]
        );

        let notices = projection.observe(Some(waiting()));
        assert!(notices.contains(&Notice::OpponentLeft));
    }

    #[test]
    fn test_ball_and_innings_notices() {
        let mut projection = LocalProjection::new();
        projection.attach(room_id(), Role::Guest);
        let mut room = in_play();
        room.host_wickets = 1;
        room.host_score = 7;
        projection.observe(Some(room.clone()));

        room.host_wickets = 2;
        room.innings_state = Innings::Second;
        room.batting_team = Some(Role::Guest);
        room.game_state = GameState::Bowling;
        room.target = Some(8);
        room.current_balls = 0;

        let notices = projection.observe(Some(room));
        assert_eq!(
            notices,
            vec![
                Notice::PhaseChanged {
                    from: GameState::Bowling,
                    to: GameState::Batting
                },
                Notice::BallResolved {
                    batting: Role::Host,
                    outcome: BallOutcome::Wicket
                },
                Notice::InningsSwitched {
                    batting: Role::Guest,
                    target: 8
                },
            ]
        );
    }

    #[test]
    fn test_vanished() {
        let mut projection = LocalProjection::new();
        projection.attach(room_id(), Role::Guest);
        projection.observe(Some(in_play()));

        assert_eq!(projection.observe(None), vec![Notice::RoomVanished]);
    }

    #[test]
    fn test_other_room_ignored() {
        let mut projection = LocalProjection::new();
        projection.attach(room_id(), Role::Guest);
        let other = Room::new(RoomId::parse("OTHER1").unwrap(), "Cara".to_string());

        assert!(projection.observe(Some(other)).is_empty());
        assert!(projection.room().is_none());
    }

    #[test]
    fn test_scoreboard() {
        let config = GameConfig::default();
        let mut projection = LocalProjection::new();
        projection.attach(room_id(), Role::Guest);

        let mut room = in_play();
        room.innings_state = Innings::Second;
        room.batting_team = Some(Role::Guest);
        room.game_state = GameState::Bowling;
        room.host_score = 8;
        room.target = Some(9);
        room.guest_score = 3;
        room.current_balls = 4;
        room.host_choice = Some(2);
        projection.observe(Some(room));

        let board = projection.scoreboard(&config).unwrap();
        assert_eq!(board.phase, GameState::Batting);
        assert_eq!(board.player_name.as_deref(), Some("Ben"));
        assert_eq!(board.opponent_name.as_deref(), Some("Asha"));
        assert_eq!(board.remaining_runs, Some(6));
        assert_eq!(board.remaining_balls, 8);
        assert!(board.opponent_ready);
        assert!(board.is_my_turn);
        assert_eq!(board.my_choice, None);

        let json = board.to_json();
        assert_eq!(json["phase"], "batting");
        assert_eq!(json["remaining_runs"], 6);
        assert!(json.get("result").is_none());
    }
}
