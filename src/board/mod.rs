pub mod moves;
pub mod piece;
pub mod position;

pub use moves::{BestMove, Move};
pub use piece::{Kind, Piece, Side};
pub use position::{PlacementError, Position};
