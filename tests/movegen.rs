use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use sable::{Position, Side};

#[test]
fn startpos_generates_twenty_moves() {
    let pos = Position::startpos();
    assert_eq!(pos.legal_moves(Side::A).len(), 20);
    assert_eq!(pos.legal_moves(Side::B).len(), 20);
}

#[test]
fn legal_moves_is_deterministic_without_mutation() {
    let pos = Position::startpos();
    let first = pos.legal_moves(Side::A).to_vec();
    let second = pos.legal_moves(Side::A).to_vec();
    assert_eq!(first, second);
}

#[test]
fn no_legal_move_leaves_own_king_in_check() {
    // Side A king is pinned against threats on two lines.
    let placement = concat!(
        "K       /",
        "        /",
        "    q   /",
        "        /",
        "        /",
        "        /",
        "        /",
        "   r   k",
    );
    let pos = Position::from_placement(placement, Side::A).unwrap();
    for mv in pos.legal_moves(Side::A) {
        let mut probe = pos.clone();
        probe.execute_move(*mv);
        assert!(
            !probe.king_in_check(Side::A),
            "move {} leaves the king in check",
            mv
        );
    }
}

#[test]
fn random_playout_never_leaves_mover_in_check() {
    // Drive a few dozen random games; the legality filter must hold at
    // every ply for both sides.
    let mut rng = SmallRng::seed_from_u64(0x5AB1E);
    for _ in 0..25 {
        let mut pos = Position::startpos();
        for _ in 0..60 {
            let side = pos.side_to_move();
            let moves = pos.legal_moves(side).to_vec();
            if moves.is_empty() {
                break;
            }
            let mv = moves[rng.gen_range(0..moves.len())];
            pos.execute_move(mv);
            assert!(!pos.king_in_check(side), "mover left in check by {}", mv);
            pos.advance_turn();
        }
    }
}

#[test]
fn check_is_detected_from_king_square() {
    let placement = concat!(
        "    K   /",
        "        /",
        "    r   /",
        "        /",
        "        /",
        "        /",
        "        /",
        "       k",
    );
    let pos = Position::from_placement(placement, Side::A).unwrap();
    assert!(pos.king_in_check(Side::A));
    assert!(!pos.king_in_check(Side::B));
}
