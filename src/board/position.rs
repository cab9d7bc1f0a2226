use thiserror::Error;

use crate::board::moves::Move;
use crate::board::piece::{Kind, Piece, Side};

/// Bounded history length. When full, the oldest half is discarded in one
/// compaction step so pushes stay O(1) amortized.
const HISTORY_CAP: usize = 64;

/// Promotion always yields a queen, so a pushing pawn gains this much.
const PROMOTION_GAIN: i32 = Kind::Queen.weight() - Kind::Pawn.weight();

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (2, 1),
    (2, -1),
    (-2, 1),
    (-2, -1),
    (1, 2),
    (1, -2),
    (-1, 2),
    (-1, -2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

const ROOK_RAYS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_RAYS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("placement must describe 64 squares, got {0}")]
    WrongLength(usize),
    #[error("unrecognized piece character {0:?} at square {1}")]
    BadToken(char, usize),
}

/// Full game state: a mailbox of 64 packed squares plus the side to move,
/// the turn counter, the last executed move, a bounded move history for
/// repetition detection, each king's square, and cached legal-move lists
/// for both sides. The lists are regenerated only when the turn advances.
///
/// A `Position` is either the live game state or a deep clone owned by a
/// single search task; clones are never shared.
#[derive(Clone, Debug)]
pub struct Position {
    squares: [Piece; 64],
    side_to_move: Side,
    turn: u32,
    last_move: Option<Move>,
    history: Vec<Move>,
    kings: [u8; 2],
    moves: [Vec<Move>; 2],
}

impl Position {
    /// The standard initial setup with side A to move.
    pub fn startpos() -> Position {
        let back = [
            Kind::Rook,
            Kind::Knight,
            Kind::Bishop,
            Kind::Queen,
            Kind::King,
            Kind::Bishop,
            Kind::Knight,
            Kind::Rook,
        ];
        let mut squares = [Piece::EMPTY; 64];
        for (col, &kind) in back.iter().enumerate() {
            squares[col] = Piece::new(kind, Side::A);
            squares[8 + col] = Piece::new(Kind::Pawn, Side::A);
            squares[48 + col] = Piece::new(Kind::Pawn, Side::B);
            squares[56 + col] = Piece::new(kind, Side::B);
        }
        Position::from_squares(squares, Side::A)
    }

    /// Builds a position from a placement string: one token per square in
    /// row-major order, row 0 first, using the fingerprint alphabet
    /// (space = empty, `pnbrqk` = side B, `PNBRQK` = side A). `/` and
    /// newlines between rows are accepted and ignored.
    pub fn from_placement(placement: &str, side_to_move: Side) -> Result<Position, PlacementError> {
        let mut squares = [Piece::EMPTY; 64];
        let mut idx = 0usize;
        for c in placement.chars() {
            if c == '/' || c == '\n' {
                continue;
            }
            if idx >= 64 {
                idx += 1;
                continue;
            }
            squares[idx] = Piece::from_token(c).ok_or(PlacementError::BadToken(c, idx))?;
            idx += 1;
        }
        if idx != 64 {
            return Err(PlacementError::WrongLength(idx));
        }
        Ok(Position::from_squares(squares, side_to_move))
    }

    /// Direct construction from a square array; the inbound interface for
    /// external position I/O.
    pub fn from_squares(squares: [Piece; 64], side_to_move: Side) -> Position {
        let mut pos = Position {
            squares,
            side_to_move,
            turn: 0,
            last_move: None,
            history: Vec::with_capacity(HISTORY_CAP),
            kings: [64, 64],
            moves: [Vec::new(), Vec::new()],
        };
        pos.locate_kings();
        pos.refresh_move_lists();
        pos
    }

    /// The placement string for this position, rows separated by `/`.
    pub fn placement(&self) -> String {
        let mut out = String::with_capacity(71);
        for row in 0..8 {
            if row > 0 {
                out.push('/');
            }
            for col in 0..8 {
                out.push(self.squares[row * 8 + col].token());
            }
        }
        out
    }

    /// Canonical cache key: the 64 square tokens in row-major order.
    /// Deliberately ignores side-to-move, castling and en passant state;
    /// the cache's risk counters compensate for the resulting collisions.
    pub fn fingerprint(&self) -> String {
        self.squares.iter().map(|p| p.token()).collect()
    }

    #[inline]
    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    pub fn set_side_to_move(&mut self, side: Side) {
        if self.side_to_move != side {
            self.side_to_move = side;
            self.refresh_move_lists();
        }
    }

    #[inline]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    #[inline]
    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    #[inline]
    pub fn piece_at(&self, square: u8) -> Piece {
        self.squares[square as usize]
    }

    /// Overwrites one square. Used by external position I/O when composing
    /// a board; callers should rebuild via [`Position::from_squares`] or
    /// call [`Position::refresh_move_lists`] when done editing.
    pub fn set_piece(&mut self, square: u8, piece: Piece) {
        self.squares[square as usize] = piece;
        if piece.kind() == Kind::King {
            self.kings[piece.side().index()] = square;
        }
    }

    #[inline]
    pub fn king_square(&self, side: Side) -> Option<u8> {
        let sq = self.kings[side.index()];
        (sq < 64).then_some(sq)
    }

    /// Number of pieces (of any kind) the side still has on the board.
    pub fn material_count(&self, side: Side) -> u32 {
        self.squares.iter().filter(|p| p.is_side(side)).count() as u32
    }

    /// The cached legal-move list for `side`, current as of the last turn
    /// advance (or construction).
    pub fn legal_moves(&self, side: Side) -> &[Move] {
        &self.moves[side.index()]
    }

    /// Applies `mv` in place. The move must come from move generation on
    /// this position; three defensive invariants guard against upstream
    /// defects and abort the search run when violated.
    pub fn execute_move(&mut self, mv: Move) {
        let src = self.squares[mv.from as usize];
        if src.is_empty() {
            panic!("execute_move: origin {} is empty ({})", mv.from, mv);
        }
        if self.last_move == Some(mv) {
            panic!("execute_move: move {} repeats the previous move", mv);
        }
        let dst = self.squares[mv.to as usize];
        if !dst.is_empty() && dst.side() == src.side() {
            panic!("execute_move: {} captures own piece", mv);
        }
        self.apply_move(mv);
        self.push_history(mv);
        self.last_move = Some(mv);
    }

    /// Flips the side to move, bumps the turn counter, regenerates both
    /// sides' legal-move lists and refreshes the kings' in-check markers.
    pub fn advance_turn(&mut self) {
        self.side_to_move = self.side_to_move.opponent();
        self.turn += 1;
        self.refresh_move_lists();
    }

    /// True if any opponent pseudo-legal move lands on `side`'s king.
    pub fn king_in_check(&self, side: Side) -> bool {
        let king = self.kings[side.index()];
        if king >= 64 {
            return false;
        }
        self.pseudo_moves(side.opponent())
            .iter()
            .any(|m| m.to == king)
    }

    /// True if `mv` (endpoint equality) occurs at least `max_repetitions`
    /// times within the most recent `2^(max_repetitions+1)` history entries.
    pub fn check_draw_by_repetition(&self, mv: Move, max_repetitions: u32) -> bool {
        let window = 1usize << (max_repetitions + 1);
        let start = self.history.len().saturating_sub(window);
        let seen = self.history[start..].iter().filter(|m| **m == mv).count();
        seen >= max_repetitions as usize
    }

    /// Regenerates both cached legal-move lists and the in-check markers.
    /// Also relocates the kings, so square edits through
    /// [`Position::set_piece`] take full effect here.
    pub fn refresh_move_lists(&mut self) {
        self.locate_kings();
        self.moves[Side::A.index()] = self.compute_legal(Side::A);
        self.moves[Side::B.index()] = self.compute_legal(Side::B);
        for side in [Side::A, Side::B] {
            if let Some(king) = self.king_square(side) {
                let checked = self.king_in_check(side);
                self.squares[king as usize].set_in_check(checked);
            }
        }
    }

    // ---- internals ----------------------------------------------------

    fn locate_kings(&mut self) {
        self.kings = [64, 64];
        for (idx, piece) in self.squares.iter().enumerate() {
            if piece.kind() == Kind::King {
                self.kings[piece.side().index()] = idx as u8;
            }
        }
    }

    fn push_history(&mut self, mv: Move) {
        if self.history.len() >= HISTORY_CAP {
            self.history.drain(..HISTORY_CAP / 2);
        }
        self.history.push(mv);
    }

    /// Board mechanics shared by `execute_move` and legality probes:
    /// relocation, capture (including en passant), castling rook shift,
    /// promotion, king tracking.
    fn apply_move(&mut self, mv: Move) {
        let mut piece = self.squares[mv.from as usize];
        let side = piece.side();

        // En passant: a pawn moving diagonally onto an empty square takes
        // the pawn that just passed it, which sits on the origin row.
        if piece.kind() == Kind::Pawn
            && mv.from_col() != mv.to_col()
            && self.squares[mv.to as usize].is_empty()
        {
            let bypassed = mv.from_row() * 8 + mv.to_col();
            self.squares[bypassed as usize] = Piece::EMPTY;
        }

        // Castling: the king moves two columns; drag the rook over.
        if piece.kind() == Kind::King && mv.from_col().abs_diff(mv.to_col()) == 2 {
            let row = mv.from_row();
            let (rook_from, rook_to) = if mv.to_col() > mv.from_col() {
                (row * 8 + 7, row * 8 + 5)
            } else {
                (row * 8, row * 8 + 3)
            };
            let mut rook = self.squares[rook_from as usize];
            rook.mark_moved();
            self.squares[rook_to as usize] = rook;
            self.squares[rook_from as usize] = Piece::EMPTY;
        }

        // Promotion: a pawn reaching the far rank becomes a queen.
        if piece.kind() == Kind::Pawn && mv.to_row() == side.last_rank() {
            piece = Piece::new(Kind::Queen, side);
        }

        piece.mark_moved();
        self.squares[mv.to as usize] = piece;
        self.squares[mv.from as usize] = Piece::EMPTY;
        if piece.kind() == Kind::King {
            self.kings[side.index()] = mv.to;
        }
    }

    fn compute_legal(&self, side: Side) -> Vec<Move> {
        self.pseudo_moves(side)
            .into_iter()
            .filter(|mv| self.leaves_king_safe(side, *mv))
            .collect()
    }

    fn leaves_king_safe(&self, side: Side, mv: Move) -> bool {
        let mut probe = self.clone();
        probe.apply_move(mv);
        !probe.king_in_check(side)
    }

    fn pseudo_moves(&self, side: Side) -> Vec<Move> {
        let mut out = Vec::with_capacity(48);
        for from in 0..64u8 {
            let piece = self.squares[from as usize];
            if !piece.is_side(side) {
                continue;
            }
            match piece.kind() {
                Kind::Pawn => self.pawn_moves(from, side, &mut out),
                Kind::Knight => self.offset_moves(from, side, &KNIGHT_OFFSETS, &mut out),
                Kind::Bishop => self.ray_moves(from, side, &BISHOP_RAYS, &mut out),
                Kind::Rook => self.ray_moves(from, side, &ROOK_RAYS, &mut out),
                Kind::Queen => {
                    self.ray_moves(from, side, &ROOK_RAYS, &mut out);
                    self.ray_moves(from, side, &BISHOP_RAYS, &mut out);
                }
                Kind::King => {
                    self.offset_moves(from, side, &KING_OFFSETS, &mut out);
                    self.castling_moves(from, side, &mut out);
                }
                Kind::Empty => {}
            }
        }
        out
    }

    fn pawn_moves(&self, from: u8, side: Side, out: &mut Vec<Move>) {
        let row = (from / 8) as i8;
        let col = (from % 8) as i8;
        let dir = side.forward();
        let promo = |to_row: i8| -> i32 {
            if to_row as u8 == side.last_rank() {
                PROMOTION_GAIN
            } else {
                0
            }
        };

        // Single and double push onto empty squares only.
        if let Some(one) = square_at(row + dir, col) {
            if self.squares[one as usize].is_empty() {
                out.push(Move::new(from, one, promo(row + dir)));
                if !self.squares[from as usize].has_moved() {
                    if let Some(two) = square_at(row + 2 * dir, col) {
                        if self.squares[two as usize].is_empty() {
                            out.push(Move::quiet(from, two));
                        }
                    }
                }
            }
        }

        // Diagonal captures onto occupied enemy squares.
        for dc in [-1i8, 1] {
            if let Some(to) = square_at(row + dir, col + dc) {
                let target = self.squares[to as usize];
                if target.is_side(side.opponent()) {
                    out.push(Move::new(from, to, target.kind().weight() + promo(row + dir)));
                }
            }
        }

        // En passant: the previous move was a two-square pawn advance
        // ending beside this pawn on the same row.
        if let Some(last) = self.last_move {
            let victim = self.squares[last.to as usize];
            if victim.kind() == Kind::Pawn
                && victim.is_side(side.opponent())
                && last.from_row().abs_diff(last.to_row()) == 2
                && last.to_row() as i8 == row
                && (last.to_col() as i8 - col).abs() == 1
            {
                if let Some(to) = square_at(row + dir, last.to_col() as i8) {
                    if self.squares[to as usize].is_empty() {
                        out.push(Move::new(from, to, Kind::Pawn.weight()));
                    }
                }
            }
        }
    }

    fn offset_moves(&self, from: u8, side: Side, offsets: &[(i8, i8)], out: &mut Vec<Move>) {
        let row = (from / 8) as i8;
        let col = (from % 8) as i8;
        for &(dr, dc) in offsets {
            if let Some(to) = square_at(row + dr, col + dc) {
                let target = self.squares[to as usize];
                if target.is_empty() {
                    out.push(Move::quiet(from, to));
                } else if target.side() != side {
                    out.push(Move::new(from, to, target.kind().weight()));
                }
            }
        }
    }

    fn ray_moves(&self, from: u8, side: Side, rays: &[(i8, i8)], out: &mut Vec<Move>) {
        let row = (from / 8) as i8;
        let col = (from % 8) as i8;
        for &(dr, dc) in rays {
            let mut r = row + dr;
            let mut c = col + dc;
            while let Some(to) = square_at(r, c) {
                let target = self.squares[to as usize];
                if target.is_empty() {
                    out.push(Move::quiet(from, to));
                } else {
                    if target.side() != side {
                        out.push(Move::new(from, to, target.kind().weight()));
                    }
                    break;
                }
                r += dr;
                c += dc;
            }
        }
    }

    /// Castling either side: king and that rook unmoved, every square
    /// between them empty. Whether the king's destination is attacked is
    /// caught by the ordinary post-move check filter.
    fn castling_moves(&self, from: u8, side: Side, out: &mut Vec<Move>) {
        let piece = self.squares[from as usize];
        if piece.has_moved() {
            return;
        }
        let row = from / 8;
        let col = from % 8;
        for (rook_col, step) in [(7u8, 1i8), (0u8, -1i8)] {
            let rook = self.squares[(row * 8 + rook_col) as usize];
            if rook.kind() != Kind::Rook || !rook.is_side(side) || rook.has_moved() {
                continue;
            }
            let mut clear = true;
            let mut c = col as i8 + step;
            while c != rook_col as i8 {
                if !self.squares[(row * 8 + c as u8) as usize].is_empty() {
                    clear = false;
                    break;
                }
                c += step;
            }
            if clear {
                if let Some(to) = square_at(row as i8, col as i8 + 2 * step) {
                    out.push(Move::quiet(from, to));
                }
            }
        }
    }
}

#[inline]
fn square_at(row: i8, col: i8) -> Option<u8> {
    if (0..8).contains(&row) && (0..8).contains(&col) {
        Some((row * 8 + col) as u8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_has_twenty_moves_per_side() {
        let pos = Position::startpos();
        assert_eq!(pos.legal_moves(Side::A).len(), 20);
        assert_eq!(pos.legal_moves(Side::B).len(), 20);
    }

    #[test]
    fn placement_round_trips() {
        let pos = Position::startpos();
        let text = pos.placement();
        let back = Position::from_placement(&text, Side::A).unwrap();
        assert_eq!(back.fingerprint(), pos.fingerprint());
    }

    #[test]
    fn refresh_relocates_kings_after_square_edits() {
        // A king on e1 under fire from the B rook on e8.
        let placement = concat!(
            "    K   /",
            "        /",
            "        /",
            "        /",
            "        /",
            "        /",
            "        /",
            "    r  k",
        );
        let mut pos = Position::from_placement(placement, Side::A).unwrap();
        assert!(pos.king_in_check(Side::A));

        // Overwrite the king's square; the tracked location must not keep
        // pointing at the rook that now stands there.
        pos.set_piece(4, Piece::new(Kind::Rook, Side::A));
        pos.refresh_move_lists();
        assert_eq!(pos.king_square(Side::A), None);
        assert!(!pos.king_in_check(Side::A));

        pos.set_piece(0, Piece::new(Kind::King, Side::A));
        pos.refresh_move_lists();
        assert_eq!(pos.king_square(Side::A), Some(0));
        assert!(!pos.king_in_check(Side::A));
    }

    #[test]
    fn fingerprint_ignores_side_to_move() {
        let a = Position::startpos();
        let mut b = Position::startpos();
        b.set_side_to_move(Side::B);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
