use std::fmt;
use std::hash::{Hash, Hasher};

/// A half-move between two square indices (0..63, row-major).
///
/// `value` is the tactical gain of the move in centipawns (captured
/// material, plus the promotion differential); quiet moves carry 0.
/// Equality and hashing deliberately cover the endpoints only, so a quiet
/// move and a capture sharing endpoints compare equal. History and cache
/// lookups depend on this.
#[derive(Clone, Copy, Debug)]
pub struct Move {
    pub from: u8,
    pub to: u8,
    pub value: i32,
}

impl Move {
    #[inline]
    pub const fn new(from: u8, to: u8, value: i32) -> Move {
        Move { from, to, value }
    }

    #[inline]
    pub const fn quiet(from: u8, to: u8) -> Move {
        Move { from, to, value: 0 }
    }

    #[inline]
    pub const fn is_quiet(&self) -> bool {
        self.value == 0
    }

    #[inline]
    pub const fn from_row(&self) -> u8 {
        self.from / 8
    }

    #[inline]
    pub const fn from_col(&self) -> u8 {
        self.from % 8
    }

    #[inline]
    pub const fn to_row(&self) -> u8 {
        self.to / 8
    }

    #[inline]
    pub const fn to_col(&self) -> u8 {
        self.to % 8
    }
}

impl PartialEq for Move {
    fn eq(&self, other: &Move) -> bool {
        self.from == other.from && self.to == other.to
    }
}

impl Eq for Move {}

impl Hash for Move {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.from.hash(state);
        self.to.hash(state);
    }
}

impl fmt::Display for Move {
    /// Coordinate notation, e.g. `e2e4` (col a..h, row 1..8).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            (b'a' + self.from_col()) as char,
            self.from_row() + 1,
            (b'a' + self.to_col()) as char,
            self.to_row() + 1,
        )
    }
}

/// Outcome of a search task or of a whole engine invocation.
#[derive(Clone, Copy, Debug)]
pub struct BestMove {
    pub mv: Move,
    /// Score on the maximizer-absolute scale: positive favors side A.
    pub value: i32,
    /// True when the move ends the game (opponent has no reply).
    pub terminal: bool,
    /// Positions examined while producing this result.
    pub examined: u64,
}

impl BestMove {
    pub fn new(mv: Move, value: i32) -> BestMove {
        BestMove { mv, value, terminal: false, examined: 0 }
    }
}
