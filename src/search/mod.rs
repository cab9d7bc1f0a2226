pub mod cache;
pub mod config;
pub mod engine;
pub mod eval;
pub mod minimax;

pub use cache::{CacheEntry, CacheStats, MoveCache, Objective, SnapshotError};
pub use config::SearchConfig;
pub use engine::SearchEngine;
