pub mod board;
pub mod search;

pub use board::{BestMove, Kind, Move, Piece, PlacementError, Position, Side};
pub use search::{MoveCache, SearchConfig, SearchEngine};
