use serde::{Deserialize, Serialize};

/// The two players. Side `A` owns rows 0..=1 at game start and pushes its
/// pawns toward row 7; side `B` mirrors it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    #[inline]
    pub const fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Pawn push direction as a row delta.
    #[inline]
    pub const fn forward(self) -> i8 {
        match self {
            Side::A => 1,
            Side::B => -1,
        }
    }

    /// Row a pawn of this side promotes on.
    #[inline]
    pub const fn last_rank(self) -> u8 {
        match self {
            Side::A => 7,
            Side::B => 0,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Kind {
    Empty = 0,
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl Kind {
    /// Material value in centipawns. The king carries a sentinel weight so
    /// it dominates any exchange sequence.
    #[inline]
    pub const fn weight(self) -> i32 {
        match self {
            Kind::Empty => 0,
            Kind::Pawn => 100,
            Kind::Knight => 320,
            Kind::Bishop => 330,
            Kind::Rook => 500,
            Kind::Queen => 900,
            Kind::King => 20_000,
        }
    }

    fn from_bits(bits: u8) -> Kind {
        match bits {
            1 => Kind::Pawn,
            2 => Kind::Knight,
            3 => Kind::Bishop,
            4 => Kind::Rook,
            5 => Kind::Queen,
            6 => Kind::King,
            _ => Kind::Empty,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Kind::Empty => ' ',
            Kind::Pawn => 'p',
            Kind::Knight => 'n',
            Kind::Bishop => 'b',
            Kind::Rook => 'r',
            Kind::Queen => 'q',
            Kind::King => 'k',
        }
    }
}

/// One square's contents packed into a byte:
/// bits 0-2 kind, bit 3 side, bit 4 has-moved, bit 5 in-check marker.
/// An empty square is all-zero; no stray side/moved bits survive a clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Piece(u8);

const KIND_MASK: u8 = 0b0000_0111;
const SIDE_BIT: u8 = 0b0000_1000;
const MOVED_BIT: u8 = 0b0001_0000;
const CHECK_BIT: u8 = 0b0010_0000;

impl Piece {
    pub const EMPTY: Piece = Piece(0);

    #[inline]
    pub fn new(kind: Kind, side: Side) -> Piece {
        let side_bits = match side {
            Side::A => 0,
            Side::B => SIDE_BIT,
        };
        Piece(kind as u8 | side_bits)
    }

    #[inline]
    pub fn kind(self) -> Kind {
        Kind::from_bits(self.0 & KIND_MASK)
    }

    #[inline]
    pub fn side(self) -> Side {
        if self.0 & SIDE_BIT == 0 {
            Side::A
        } else {
            Side::B
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 & KIND_MASK == 0
    }

    #[inline]
    pub fn is_side(self, side: Side) -> bool {
        !self.is_empty() && self.side() == side
    }

    #[inline]
    pub fn has_moved(self) -> bool {
        self.0 & MOVED_BIT != 0
    }

    #[inline]
    pub fn mark_moved(&mut self) {
        self.0 |= MOVED_BIT;
    }

    #[inline]
    pub fn in_check(self) -> bool {
        self.0 & CHECK_BIT != 0
    }

    #[inline]
    pub fn set_in_check(&mut self, flag: bool) {
        if flag {
            self.0 |= CHECK_BIT;
        } else {
            self.0 &= !CHECK_BIT;
        }
    }

    /// Fingerprint token: space for empty, lower-case for side B,
    /// upper-case for side A.
    pub fn token(self) -> char {
        if self.is_empty() {
            ' '
        } else {
            let c = self.kind().letter();
            match self.side() {
                Side::A => c.to_ascii_uppercase(),
                Side::B => c,
            }
        }
    }

    /// Inverse of [`Piece::token`]. `None` for an unrecognized character.
    pub fn from_token(c: char) -> Option<Piece> {
        if c == ' ' {
            return Some(Piece::EMPTY);
        }
        let side = if c.is_ascii_uppercase() { Side::A } else { Side::B };
        let kind = match c.to_ascii_lowercase() {
            'p' => Kind::Pawn,
            'n' => Kind::Knight,
            'b' => Kind::Bishop,
            'r' => Kind::Rook,
            'q' => Kind::Queen,
            'k' => Kind::King,
            _ => return None,
        };
        Some(Piece::new(kind, side))
    }
}

impl Default for Piece {
    fn default() -> Self {
        Piece::EMPTY
    }
}
