use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::board::{Move, Position, Side};
use crate::search::cache::{MoveCache, Objective};
use crate::search::config::SearchConfig;
use crate::search::eval::{evaluate, DRAW_SCORE, MATE_SCORE};

/// How far past the nominal depth limit tactical (non-quiet) lines keep
/// running before they are cut off unconditionally.
const QUIESCENCE_PLIES: i32 = 2;

/// Shared wall-clock cutoff, polled cooperatively. Stored as microseconds
/// past an anchor instant so tasks can read it without locking and the
/// owner can cancel by rewriting it to "now".
pub struct Deadline {
    anchor: Instant,
    cutoff_micros: AtomicU64,
}

impl Deadline {
    pub fn unbounded() -> Deadline {
        Deadline { anchor: Instant::now(), cutoff_micros: AtomicU64::new(u64::MAX) }
    }

    pub fn after(budget: Duration) -> Deadline {
        Deadline {
            anchor: Instant::now(),
            cutoff_micros: AtomicU64::new(budget.as_micros().min(u64::MAX as u128) as u64),
        }
    }

    /// Budget from a configured per-move second count; 0 means unbounded.
    pub fn from_secs(secs: u64) -> Deadline {
        if secs == 0 {
            Deadline::unbounded()
        } else {
            Deadline::after(Duration::from_secs(secs))
        }
    }

    #[inline]
    pub fn expired(&self) -> bool {
        let cutoff = self.cutoff_micros.load(Ordering::Relaxed);
        cutoff != u64::MAX && self.anchor.elapsed().as_micros() as u64 >= cutoff
    }

    /// Cooperative cancellation: moves the cutoff to "now". Running tasks
    /// notice at their next poll and drain out of their loops.
    pub fn cancel(&self) {
        self.cutoff_micros.store(0, Ordering::Relaxed);
    }
}

#[inline]
pub fn objective_for(maximize: bool) -> Objective {
    if maximize {
        Objective::Maximize
    } else {
        Objective::Minimize
    }
}

/// Side A owns the maximizer-absolute scale.
#[inline]
pub fn maximizes(side: Side) -> bool {
    side == Side::A
}

/// Single-threaded recursive alpha-beta worker. One per root task; only the
/// cache, the deadline and the progress counter are shared.
pub struct Searcher {
    cache: Option<Arc<MoveCache>>,
    deadline: Arc<Deadline>,
    risk_threshold: f64,
    throttle: Option<Duration>,
    progress: Arc<AtomicU64>,
    /// Moves examined by this worker.
    pub examined: u64,
}

impl Searcher {
    pub fn new(
        cache: Option<Arc<MoveCache>>,
        deadline: Arc<Deadline>,
        config: &SearchConfig,
        progress: Arc<AtomicU64>,
    ) -> Searcher {
        Searcher {
            cache,
            deadline,
            risk_threshold: f64::from(config.risk_threshold_percent) / 100.0,
            throttle: (config.throttle_ns > 0).then(|| Duration::from_nanos(config.throttle_ns)),
            progress,
            examined: 0,
        }
    }

    /// Full-window entry point. Returns the position's value and the best
    /// move for the side to move, or `None` when the deadline expired
    /// before any candidate was scored.
    pub fn search(
        &mut self,
        pos: &Position,
        depth: i32,
        maximize: bool,
    ) -> (i32, Option<Move>) {
        self.minimax(pos, -MATE_SCORE - 1_000, MATE_SCORE + 1_000, depth, maximize)
    }

    fn minimax(
        &mut self,
        pos: &Position,
        mut alpha: i32,
        mut beta: i32,
        depth: i32,
        maximize: bool,
    ) -> (i32, Option<Move>) {
        let side = pos.side_to_move();
        let moves = pos.legal_moves(side);
        if moves.is_empty() {
            return (self.terminal_score(pos, side, depth, maximize), None);
        }

        let moves = moves.to_vec();
        let mut best_value = if maximize { i32::MIN } else { i32::MAX };
        let mut best_move: Option<Move> = None;

        for mv in moves {
            if self.deadline.expired() {
                break;
            }
            self.note_examined();

            // Past the depth limit quiet moves become leaves immediately;
            // tactical moves keep the exchange running for a bounded
            // number of extra plies so we never score mid-capture.
            let leaf = depth <= 0 && (mv.is_quiet() || depth <= -QUIESCENCE_PLIES);

            let mut child = pos.clone();
            child.execute_move(mv);
            child.advance_turn();

            let value = if leaf {
                evaluate(&child)
            } else {
                self.child_value(&child, alpha, beta, depth - 1, !maximize)
            };

            if maximize {
                if value > best_value {
                    best_value = value;
                    best_move = Some(mv);
                }
                alpha = alpha.max(best_value);
            } else {
                if value < best_value {
                    best_value = value;
                    best_move = Some(mv);
                }
                beta = beta.min(best_value);
            }
            if alpha >= beta {
                break;
            }
        }

        match best_move {
            // Deadline fired before anything was scored: fall back to the
            // static evaluation rather than reporting an infinite bound.
            None => (evaluate(pos), None),
            Some(_) => (best_value, best_move),
        }
    }

    /// Value of a child position, consulting the shared cache first. A
    /// low-risk cached answer is returned as-is; a risky one triggers a
    /// full recomputation with the retry/improvement counters updated so
    /// the risk estimate keeps learning.
    fn child_value(
        &mut self,
        child: &Position,
        alpha: i32,
        beta: i32,
        depth: i32,
        maximize: bool,
    ) -> i32 {
        let Some(cache) = self.cache.clone() else {
            return self.minimax(child, alpha, beta, depth, maximize).0;
        };

        let objective = objective_for(maximize);
        let fingerprint = child.fingerprint();

        if let Some(entry) = cache.lookup(&fingerprint, objective) {
            if cache.risk(&fingerprint) <= self.risk_threshold {
                return entry.value;
            }
            cache.record_retry(&fingerprint);
            let before = self.examined;
            let (value, best) = self.minimax(child, alpha, beta, depth, maximize);
            if objective.prefers(value, entry.value) {
                cache.record_improvement(&fingerprint);
            }
            if let Some(best) = best {
                cache.offer(&fingerprint, objective, best, value, self.examined - before);
            }
            return value;
        }

        let before = self.examined;
        let (value, best) = self.minimax(child, alpha, beta, depth, maximize);
        if let Some(best) = best {
            cache.offer(&fingerprint, objective, best, value, self.examined - before);
        }
        value
    }

    /// No legal replies: mate scores carry the remaining depth so nearer
    /// mates dominate, stalemate is a dead draw.
    fn terminal_score(&self, pos: &Position, side: Side, depth: i32, maximize: bool) -> i32 {
        if pos.king_in_check(side) {
            let mate = MATE_SCORE + depth.max(0);
            if maximize {
                -mate
            } else {
                mate
            }
        } else {
            DRAW_SCORE
        }
    }

    fn note_examined(&mut self) {
        self.examined += 1;
        self.progress.fetch_add(1, Ordering::Relaxed);
        if let Some(pause) = self.throttle {
            std::thread::sleep(pause);
        }
    }
}
