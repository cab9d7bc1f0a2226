use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use sable::search::eval::{evaluate, DRAW_SCORE, MATE_SCORE};
use sable::search::minimax::{Deadline, Searcher};
use sable::search::SearchConfig;
use sable::{Position, Side};

/// Reference implementation: plain exhaustive minimax with the same leaf
/// rule (quiet cut-off at depth 0, tactical lines run 2 plies longer) and
/// no pruning, no cache.
fn exhaustive(pos: &Position, depth: i32, maximize: bool) -> i32 {
    let side = pos.side_to_move();
    let moves = pos.legal_moves(side).to_vec();
    if moves.is_empty() {
        if pos.king_in_check(side) {
            let mate = MATE_SCORE + depth.max(0);
            return if maximize { -mate } else { mate };
        }
        return DRAW_SCORE;
    }
    let mut best = if maximize { i32::MIN } else { i32::MAX };
    for mv in moves {
        let leaf = depth <= 0 && (mv.is_quiet() || depth <= -2);
        let mut child = pos.clone();
        child.execute_move(mv);
        child.advance_turn();
        let value = if leaf {
            evaluate(&child)
        } else {
            exhaustive(&child, depth - 1, !maximize)
        };
        best = if maximize { best.max(value) } else { best.min(value) };
    }
    best
}

fn pruned(pos: &Position, depth: i32, maximize: bool) -> i32 {
    let config = SearchConfig { use_cache: false, ..SearchConfig::default() };
    let mut searcher = Searcher::new(
        None,
        Arc::new(Deadline::unbounded()),
        &config,
        Arc::new(AtomicU64::new(0)),
    );
    searcher.search(pos, depth, maximize).0
}

#[test]
fn alphabeta_matches_exhaustive_minimax_from_startpos() {
    let pos = Position::startpos();
    assert_eq!(pruned(&pos, 2, true), exhaustive(&pos, 2, true));
}

#[test]
fn alphabeta_matches_exhaustive_minimax_for_the_minimizer() {
    let mut pos = Position::startpos();
    pos.set_side_to_move(Side::B);
    assert_eq!(pruned(&pos, 2, false), exhaustive(&pos, 2, false));
}

#[test]
fn alphabeta_matches_exhaustive_in_a_tactical_position() {
    // Queens face off; quiescence kicks in on the exchanges.
    let placement = concat!(
        "       K/",
        "   qQ   /",
        "        /",
        "        /",
        "        /",
        "        /",
        "        /",
        "k       ",
    );
    let pos = Position::from_placement(placement, Side::A).unwrap();
    assert_eq!(pruned(&pos, 2, true), exhaustive(&pos, 2, true));
}
