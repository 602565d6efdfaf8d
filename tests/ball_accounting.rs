//! Scoreboard bookkeeping over arbitrary sequences of balls.

use hand_cricket_sync::{
    BatOrBowl, GameConfig, GameMachine, GameState, Role, Room, RoomEvent, RoomId,
};
use proptest::prelude::*;

/// Host batting, with limits high enough that the innings never closes.
fn batting_room(machine: &GameMachine) -> Room {
    let room = Room::new(RoomId::parse("PROP01").unwrap(), "Asha".to_string());
    let steps = [
        RoomEvent::GuestJoined {
            name: "Ben".to_string(),
        },
        RoomEvent::Toss {
            by: Role::Host,
            winner: Role::Host,
        },
        RoomEvent::Declare {
            by: Role::Host,
            decision: BatOrBowl::Bat,
        },
    ];
    steps.into_iter().fold(room, |room, event| {
        machine.reduce(&room, event).unwrap().0
    })
}

proptest! {
    #[test]
    fn balls_runs_and_wickets_add_up(
        balls in prop::collection::vec((1u8..=6, 1u8..=6), 0..40)
    ) {
        let machine = GameMachine::new(
            GameConfig::new().with_max_balls(200).with_max_wickets(200),
        );
        let mut room = batting_room(&machine);
        prop_assert_eq!(room.game_state, GameState::Batting);

        for &(bat, bowl) in &balls {
            room = machine.reduce(&room, RoomEvent::Choose { by: Role::Host, number: bat }).unwrap().0;
            room = machine.reduce(&room, RoomEvent::Choose { by: Role::Guest, number: bowl }).unwrap().0;
            room = machine.reduce(&room, RoomEvent::ResolveBall).unwrap().0;
        }

        let runs: u32 = balls
            .iter()
            .filter(|(bat, bowl)| bat != bowl)
            .map(|(bat, _)| u32::from(*bat))
            .sum();
        let wickets = balls.iter().filter(|(bat, bowl)| bat == bowl).count();

        prop_assert_eq!(usize::from(room.current_balls), balls.len());
        prop_assert_eq!(room.host_score, runs);
        prop_assert_eq!(usize::from(room.host_wickets), wickets);
        prop_assert_eq!(room.guest_score, 0);
        prop_assert_eq!(room.both_choices(), None);
        prop_assert!(room.check(machine.config()).is_ok());
    }

    #[test]
    fn generated_codes_parse_back(seed in any::<u64>(), len in 1usize..12) {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(seed);
        let id = RoomId::generate(&mut rng, len);
        prop_assert_eq!(id.as_str().len(), len);
        prop_assert_eq!(RoomId::parse(id.as_str()).unwrap(), id);
    }
}
