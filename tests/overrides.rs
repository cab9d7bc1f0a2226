use sable::search::eval::MATE_SCORE;
use sable::{Move, Position, SearchConfig, SearchEngine, Side};

fn engine(depth: u32) -> SearchEngine {
    // Cache off: these positions are checked against exact search output.
    SearchEngine::new(SearchConfig { depth, use_cache: false, ..SearchConfig::default() })
}

/// Bounces the A knight b1-c3 while the B rook shuffles c8-c7, then drops
/// the rook onto c3 where the knight wants to take it. The capture's
/// endpoints now sit three times in recent history.
fn shuffled_into_repetition(placement: &str) -> Position {
    let mut pos = Position::from_placement(placement, Side::A).unwrap();
    for _ in 0..3 {
        pos.execute_move(Move::quiet(1, 18)); // Nb1-c3
        pos.advance_turn();
        pos.execute_move(Move::quiet(58, 50)); // Rc8-c7
        pos.advance_turn();
        pos.execute_move(Move::quiet(18, 1)); // Nc3-b1
        pos.advance_turn();
        if pos.turn() < 11 {
            pos.execute_move(Move::quiet(50, 58)); // Rc7-c8
        } else {
            pos.execute_move(Move::quiet(50, 18)); // Rc7-c3, en prise
        }
        pos.advance_turn();
    }
    pos
}

#[test]
fn repetition_streak_is_broken_by_a_pawn_move() {
    let placement = concat!(
        "KN      /",
        "P       /",
        "        /",
        "        /",
        "        /",
        "        /",
        "        /",
        "  r    k",
    );
    let pos = shuffled_into_repetition(placement);
    assert!(pos.check_draw_by_repetition(Move::quiet(1, 18), 3));

    // The search wants Nxc3, but that repeats; the pawn push substitutes.
    let best = engine(2).choose_move(&pos).expect("no move found");
    assert_eq!(best.mv, Move::quiet(8, 16), "expected a2-a3, got {}", best.mv);
}

#[test]
fn repetition_substitute_falls_back_to_piece_moves() {
    // Same shuffle without the pawn: the substitute is the first knight
    // move that is not the repeated capture.
    let placement = concat!(
        "KN      /",
        "        /",
        "        /",
        "        /",
        "        /",
        "        /",
        "        /",
        "  r    k",
    );
    let pos = shuffled_into_repetition(placement);
    let best = engine(2).choose_move(&pos).expect("no move found");
    assert_eq!(best.mv, Move::quiet(1, 16), "expected Nb1-a3, got {}", best.mv);
}

#[test]
fn blocked_pawn_ending_moves_the_blocker() {
    // Lone bishop sitting on a3 in front of its own pawn: whatever the
    // search liked, the blocker steps aside first.
    let placement = concat!(
        "K       /",
        "P       /",
        "B       /",
        "        /",
        "        /",
        "        /",
        "        /",
        "       k",
    );
    let pos = Position::from_placement(placement, Side::A).unwrap();
    assert!(!pos.king_in_check(Side::A));
    let best = engine(2).choose_move(&pos).expect("no move found");
    assert_eq!(best.mv, Move::quiet(16, 25), "expected Ba3-b4, got {}", best.mv);
}

#[test]
fn bare_king_escalation_finds_the_forced_mate() {
    // Queen and rook against a bare king, no mate in one. At depth 1 the
    // search sees only material; the one-time two-ply escalation reaches
    // the mate in two (Ra7 boxing in, then Qb8).
    let placement = concat!(
        " K      /",
        "        /",
        "        /",
        "        /",
        " Q      /",
        "R       /",
        "        /",
        "       k",
    );
    let pos = Position::from_placement(placement, Side::A).unwrap();
    let best = engine(1).choose_move(&pos).expect("no move found");
    assert!(
        best.value >= MATE_SCORE,
        "escalated search missed the mate: value {}",
        best.value
    );
    assert!(!best.terminal, "no root move ends the game immediately");
}
