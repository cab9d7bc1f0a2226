use crate::board::{Kind, Position, Side};

/// Scores are absolute: positive favors side A regardless of who moves.
pub const MATE_SCORE: i32 = 100_000;
pub const DRAW_SCORE: i32 = 0;

const MOBILITY_WEIGHT: i32 = 4;

#[inline]
fn signed(side: Side, value: i32) -> i32 {
    match side {
        Side::A => value,
        Side::B => -value,
    }
}

/// Centrality of a square: 0 in the corners up to 12 on the four center
/// squares, from the doubled manhattan distance to the board center.
#[inline]
fn centrality(square: u8) -> i32 {
    let row = (square / 8) as i32;
    let col = (square % 8) as i32;
    14 - ((2 * row - 7).abs() + (2 * col - 7).abs())
}

/// Static evaluation: material, a centrality bonus scaled by piece weight
/// (kings excluded), and a mobility differential signed by the mover.
/// Pure and deterministic; called once per leaf and per cache-bypass check.
pub fn evaluate(pos: &Position) -> i32 {
    let mut score = 0i32;
    for square in 0..64u8 {
        let piece = pos.piece_at(square);
        if piece.is_empty() {
            continue;
        }
        let kind = piece.kind();
        let mut worth = kind.weight();
        if kind != Kind::King {
            worth += (kind.weight() / 100) * centrality(square);
        }
        score += signed(piece.side(), worth);
    }

    let mover = pos.side_to_move();
    let mobility =
        pos.legal_moves(mover).len() as i32 - pos.legal_moves(mover.opponent()).len() as i32;
    score += signed(mover, MOBILITY_WEIGHT * mobility);

    score
}
