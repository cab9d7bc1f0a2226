use serde::{Deserialize, Serialize};

/// Search tuning knobs, passed explicitly to [`crate::search::SearchEngine`].
/// There is no ambient global configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Nominal search depth in plies.
    pub depth: u32,
    /// Wall-clock budget per move in seconds; 0 means unbounded.
    pub move_time_secs: u64,
    /// Cache answers are reused only when their risk (percent chance a
    /// recomputation would improve on them) is at or below this threshold.
    pub risk_threshold_percent: u8,
    /// Cooperative throttle: nanoseconds slept per examined move.
    pub throttle_ns: u64,
    /// Master switch for the shared move cache.
    pub use_cache: bool,
    /// At or below this many pieces for the mover, root cache adoption is
    /// skipped and every move is searched exactly.
    pub endgame_material_threshold: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            depth: 4,
            move_time_secs: 0,
            risk_threshold_percent: 25,
            throttle_ns: 0,
            use_cache: true,
            endgame_material_threshold: 5,
        }
    }
}
