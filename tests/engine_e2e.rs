use everymon::team::samples;
use everymon::{
    BattleAdapter, BattleEvent, Combatant, EngineError, MatchSeed, ReferenceBattle, Side, TeamSpec,
    TextCue,
};

fn adapter(seed: [u32; 4], a: &TeamSpec, b: &TeamSpec) -> BattleAdapter<ReferenceBattle> {
    let mut adapter = BattleAdapter::reference(MatchSeed::new(seed));
    adapter.start_battle(a, b).unwrap();
    adapter
}

fn starters(seed: [u32; 4]) -> BattleAdapter<ReferenceBattle> {
    let mut adapter = adapter(seed, &samples::fire_starter(), &samples::water_starter());
    adapter.apply_choice(Side::P1, "team 1").unwrap();
    adapter.apply_choice(Side::P2, "team 1").unwrap();
    adapter
}

fn texts(adapter: &BattleAdapter<ReferenceBattle>) -> Vec<(TextCue, Option<Combatant>)> {
    adapter
        .queue()
        .iter()
        .filter_map(|e| match e {
            BattleEvent::Text { cue, subject, .. } => Some((*cue, subject.clone())),
            _ => None,
        })
        .collect()
}

fn play_defaults(adapter: &mut BattleAdapter<ReferenceBattle>) {
    for _ in 0..1_000 {
        if adapter.is_finished() {
            return;
        }
        for side in Side::BOTH {
            if adapter.awaiting_choice(side) {
                adapter.apply_choice(side, "default").unwrap();
            }
        }
    }
    panic!("battle did not finish");
}

#[test]
fn ember_into_water_type_is_resisted() {
    let mut adapter = starters([1, 2, 3, 4]);
    adapter.apply_choice(Side::P1, "move ember").unwrap();
    adapter.apply_choice(Side::P2, "move tackle").unwrap();

    let texts = texts(&adapter);
    assert!(texts.contains(&(TextCue::Resisted, Some(Combatant::new(Side::P2, "Splashy")))));

    let rendered = adapter
        .queue()
        .iter()
        .find(|e| matches!(e, BattleEvent::Text { cue: TextCue::Resisted, .. }))
        .map(ToString::to_string);
    assert_eq!(rendered.as_deref(), Some("It's not very effective..."));
}

#[test]
fn water_gun_into_fire_type_is_super_effective() {
    let mut adapter = starters([1, 2, 3, 4]);
    adapter.apply_choice(Side::P1, "move scratch").unwrap();
    adapter.apply_choice(Side::P2, "move watergun").unwrap();

    let texts = texts(&adapter);
    assert!(texts.contains(&(TextCue::SuperEffective, Some(Combatant::new(Side::P1, "Sparky")))));
    assert!(!texts.iter().any(|(cue, _)| *cue == TextCue::Resisted));
}

#[test]
fn events_follow_log_order_within_a_turn() {
    let mut adapter = starters([1, 2, 3, 4]);
    adapter.queue_mut().clear();
    adapter.apply_choice(Side::P1, "move ember").unwrap();
    adapter.apply_choice(Side::P2, "move watergun").unwrap();

    let kinds: Vec<&str> = adapter.queue().iter().map(BattleEvent::kind).collect();
    // Sparky is faster: its move, the marker and the damage come before Splashy's.
    let first_move = kinds.iter().position(|k| *k == "move").unwrap();
    let first_damage = kinds.iter().position(|k| *k == "damage").unwrap();
    assert!(first_move < first_damage);
    assert_eq!(kinds.last(), Some(&"turn"));

    let actors: Vec<Side> = adapter
        .queue()
        .iter()
        .filter_map(|e| match e {
            BattleEvent::Move { actor, .. } => Some(actor.side),
            _ => None,
        })
        .collect();
    assert_eq!(actors, vec![Side::P1, Side::P2]);
}

#[test]
fn illegal_choice_leaves_turn_and_digest_unchanged() {
    let mut adapter = starters([1, 2, 3, 4]);
    let turn = adapter.current_turn();
    let digest = adapter.state_digest();
    let queued = adapter.queue().len();

    for bad in ["move 9", "move hydropump", "switch 1", "team 1", ""] {
        let err = adapter.apply_choice(Side::P1, bad).unwrap_err();
        assert!(matches!(err, EngineError::IllegalChoice { side: Side::P1, .. }), "{bad:?}: {err}");
    }

    assert_eq!(adapter.current_turn(), turn);
    assert_eq!(adapter.state_digest(), digest);
    assert_eq!(adapter.queue().len(), queued);
    assert!(adapter.awaiting_choice(Side::P1));
}

#[test]
fn same_seed_and_choices_give_identical_digests() {
    let script = [
        (Side::P1, "move ember"),
        (Side::P2, "move tackle"),
        (Side::P2, "move watergun"),
        (Side::P1, "move scratch"),
    ];

    let mut a = starters([9, 8, 7, 6]);
    let mut b = starters([9, 8, 7, 6]);
    for (side, choice) in script {
        a.apply_choice(side, choice).unwrap();
    }
    // Arrival order within a turn does not matter.
    for (side, choice) in [script[1], script[0], script[3], script[2]] {
        b.apply_choice(side, choice).unwrap();
    }

    assert_eq!(a.current_turn(), 3);
    assert_eq!(a.state_digest(), b.state_digest());
    assert!(a.checkpoints_from(0).eq(b.checkpoints_from(0)));
}

#[test]
fn different_choices_diverge_from_the_next_checkpoint() {
    let mut a = starters([9, 8, 7, 6]);
    let mut b = starters([9, 8, 7, 6]);

    a.apply_choice(Side::P1, "move ember").unwrap();
    b.apply_choice(Side::P1, "move scratch").unwrap();
    for adapter in [&mut a, &mut b] {
        adapter.apply_choice(Side::P2, "move tackle").unwrap();
    }

    assert_eq!(a.checkpoint(1), b.checkpoint(1));
    assert_ne!(a.checkpoint(2), b.checkpoint(2));
}

#[test]
fn different_seeds_diverge() {
    let mut a = starters([1, 1, 1, 1]);
    let mut b = starters([2, 2, 2, 2]);
    for adapter in [&mut a, &mut b] {
        play_defaults(adapter);
    }
    assert_ne!(a.log(), b.log());
}

#[test]
fn full_match_ends_with_win_and_terminal_checkpoint() {
    let mut adapter = adapter([4, 4, 4, 4], &samples::full_p1(), &samples::full_p2());
    play_defaults(&mut adapter);

    let winner = adapter.winner().unwrap().to_string();
    assert!(winner == "Player 1" || winner == "Player 2");

    let events: Vec<BattleEvent> = adapter.queue_mut().collect();
    assert!(matches!(events.first(), Some(BattleEvent::Start { .. })));
    assert_eq!(events.last(), Some(&BattleEvent::Win { winner }));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let turns: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            BattleEvent::Turn { number } => Some(*number),
            _ => None,
        })
        .collect();
    assert_eq!(turns, (1..=adapter.current_turn()).collect::<Vec<_>>());

    let terminal = adapter.latest_checkpoint().unwrap();
    assert_eq!(terminal.turn, adapter.current_turn() + 1);
    assert_eq!(terminal.digest, adapter.state_digest().digest);
    assert_eq!(adapter.translator_stats().turn_anomalies, 0);

    assert_eq!(adapter.apply_choice(Side::P1, "default"), Err(EngineError::BattleOver));
}
