use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::board::{BestMove, Kind, Move, Position, Side};
use crate::search::cache::{MoveCache, Objective};
use crate::search::config::SearchConfig;
use crate::search::eval::evaluate;
use crate::search::minimax::{maximizes, objective_for, Deadline, Searcher};

/// How many times the same endpoints may recur in recent history before
/// the repetition override kicks in.
const REPETITION_LIMIT: u32 = 3;

/// Extra plies granted by the one-time endgame escalation.
const ESCALATION_PLIES: u32 = 2;

/// Capture priority for the repetition substitute, tried in order after
/// pawn moves.
const SUBSTITUTE_ORDER: [Kind; 5] =
    [Kind::Queen, Kind::Rook, Kind::Bishop, Kind::Knight, Kind::King];

/// Progress shared between a running search and its pollers.
struct Inflight {
    done: AtomicBool,
    examined: Arc<AtomicU64>,
    best: Mutex<Option<BestMove>>,
}

impl Inflight {
    fn new() -> Inflight {
        Inflight {
            done: AtomicBool::new(true),
            examined: Arc::new(AtomicU64::new(0)),
            best: Mutex::new(None),
        }
    }
}

/// The cloneable search core: configuration, the shared cache, and the
/// inflight progress cell. The background owner task runs on a clone.
#[derive(Clone)]
struct Core {
    config: SearchConfig,
    cache: Option<Arc<MoveCache>>,
    inflight: Arc<Inflight>,
}

/// Decision orchestrator: fans one task out per legal root move, aggregates
/// their results under a shared deadline, and applies the endgame
/// overrides. Construct one per game (or share a [`MoveCache`] across
/// several) and call [`SearchEngine::choose_move`] each turn, or
/// [`SearchEngine::start_search`] plus polling for a non-blocking caller.
pub struct SearchEngine {
    core: Core,
    worker: Option<JoinHandle<Option<BestMove>>>,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> SearchEngine {
        let cache = config.use_cache.then(|| Arc::new(MoveCache::new()));
        SearchEngine::with_cache(config, cache)
    }

    /// Shares an existing cache, e.g. one restored from a snapshot.
    pub fn with_cache(config: SearchConfig, cache: Option<Arc<MoveCache>>) -> SearchEngine {
        SearchEngine {
            core: Core { config, cache, inflight: Arc::new(Inflight::new()) },
            worker: None,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.core.config
    }

    pub fn cache(&self) -> Option<&Arc<MoveCache>> {
        self.core.cache.as_ref()
    }

    /// Blocking search. `None` means the side to move has no legal move,
    /// or the deadline fired before any task produced a result.
    pub fn choose_move(&self, pos: &Position) -> Option<BestMove> {
        self.core.run(pos)
    }

    /// Non-blocking search: spawns an owning background task and returns
    /// whatever is already known (normally nothing yet). Progress is
    /// observable through [`SearchEngine::is_complete`],
    /// [`SearchEngine::current_best`] and [`SearchEngine::examined`].
    pub fn start_search(&mut self, pos: &Position) -> Option<BestMove> {
        self.join();
        self.core.inflight.done.store(false, Ordering::SeqCst);
        self.core.inflight.examined.store(0, Ordering::SeqCst);
        *self.core.inflight.best.lock().unwrap() = None;
        let core = self.core.clone();
        let pos = pos.clone();
        self.worker = Some(std::thread::spawn(move || core.run(&pos)));
        self.current_best()
    }

    /// True when no background search is running.
    pub fn is_complete(&self) -> bool {
        self.core.inflight.done.load(Ordering::SeqCst)
    }

    /// Best move found so far by the current (or last) search.
    pub fn current_best(&self) -> Option<BestMove> {
        *self.core.inflight.best.lock().unwrap()
    }

    /// Moves examined so far by the current (or last) search.
    pub fn examined(&self) -> u64 {
        self.core.inflight.examined.load(Ordering::Relaxed)
    }

    /// Waits for the background search, returning its final answer.
    pub fn join(&mut self) -> Option<BestMove> {
        match self.worker.take() {
            None => self.current_best(),
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => {
                    warn!("background search task panicked");
                    None
                }
            },
        }
    }
}

impl Core {
    fn run(&self, pos: &Position) -> Option<BestMove> {
        self.inflight.done.store(false, Ordering::SeqCst);
        self.inflight.examined.store(0, Ordering::SeqCst);
        *self.inflight.best.lock().unwrap() = None;

        let deadline = Arc::new(Deadline::from_secs(self.config.move_time_secs));
        let result = self.search_root(pos, self.config.depth, &deadline, false);

        *self.inflight.best.lock().unwrap() = result;
        self.inflight.done.store(true, Ordering::SeqCst);
        if let Some(best) = result {
            info!(
                "chose {} value {} terminal {} examined {}",
                best.mv, best.value, best.terminal, best.examined
            );
        }
        result
    }

    fn search_root(
        &self,
        pos: &Position,
        depth: u32,
        deadline: &Arc<Deadline>,
        escalated: bool,
    ) -> Option<BestMove> {
        let side = pos.side_to_move();
        let maximize = maximizes(side);
        let objective = objective_for(maximize);
        let root_moves = pos.legal_moves(side).to_vec();
        if root_moves.is_empty() {
            return None;
        }

        // A forced move needs no search at all.
        if root_moves.len() == 1 {
            let only = root_moves[0];
            self.inflight.examined.fetch_add(1, Ordering::Relaxed);
            let mut child = pos.clone();
            child.execute_move(only);
            child.advance_turn();
            let terminal = child.legal_moves(child.side_to_move()).is_empty();
            let best = BestMove { mv: only, value: evaluate(&child), terminal, examined: 1 };
            self.publish(best, objective);
            return Some(best);
        }

        // Root-level cache adoption. Disabled near the end of the game,
        // where exactness matters more than saved work.
        let adopt_from_cache = self.cache.is_some()
            && pos.material_count(side) > self.config.endgame_material_threshold;
        let risk_threshold = f64::from(self.config.risk_threshold_percent) / 100.0;

        let mut adopted: Option<BestMove> = None;
        let mut to_search: Vec<Move> = Vec::with_capacity(root_moves.len());
        for mv in root_moves {
            if adopt_from_cache {
                let cache = self.cache.as_ref().unwrap();
                let mut child = pos.clone();
                child.execute_move(mv);
                child.advance_turn();
                let fingerprint = child.fingerprint();
                if let Some(entry) = cache.lookup(&fingerprint, objective.flip()) {
                    if cache.risk(&fingerprint) <= risk_threshold {
                        // Trusted answer: no task for this move. The work it
                        // stands for still counts toward this search's total.
                        self.inflight.examined.fetch_add(entry.examined, Ordering::Relaxed);
                        if adopted.map_or(true, |b| objective.prefers(entry.value, b.value)) {
                            let best = BestMove {
                                mv,
                                value: entry.value,
                                terminal: false,
                                examined: entry.examined,
                            };
                            adopted = Some(best);
                            self.publish(best, objective);
                        }
                        continue;
                    }
                }
            }
            to_search.push(mv);
        }

        // One task per remaining root move. A panicking task is logged and
        // contributes nothing; its siblings keep running.
        let results: Vec<Option<BestMove>> = to_search
            .par_iter()
            .map(|&mv| {
                match catch_unwind(AssertUnwindSafe(|| {
                    self.root_task(pos, mv, depth, deadline, objective)
                })) {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("root task for {} panicked; discarding its result", mv);
                        None
                    }
                }
            })
            .collect();

        // Commutative aggregation: order of task completion is irrelevant.
        let mut chosen = adopted;
        let mut terminal: Option<BestMove> = None;
        for result in results.into_iter().flatten() {
            if result.terminal && terminal.is_none() {
                terminal = Some(result);
            }
            if chosen.map_or(true, |b| objective.accepts(result.value, b.value)) {
                chosen = Some(result);
            }
        }
        let mut chosen = terminal.or(chosen)?;
        chosen.examined = self.inflight.examined.load(Ordering::Relaxed);

        if !chosen.terminal {
            chosen = self.apply_overrides(pos, side, chosen);

            // A bare king against queen + rook deserves one deeper pass to
            // find the faster mate.
            if !escalated && self.should_escalate(pos, side) {
                debug!("escalating search by {} plies against bare king", ESCALATION_PLIES);
                if let Some(deeper) =
                    self.search_root(pos, depth + ESCALATION_PLIES, deadline, true)
                {
                    chosen = deeper;
                }
            }
        }

        self.publish(chosen, objective);
        Some(chosen)
    }

    /// One root move: apply it, then either detect immediate game end or
    /// run the recursive search one ply down with the goal flipped.
    fn root_task(
        &self,
        pos: &Position,
        mv: Move,
        depth: u32,
        deadline: &Arc<Deadline>,
        objective: Objective,
    ) -> Option<BestMove> {
        let maximize = maximizes(pos.side_to_move());
        let mut child = pos.clone();
        child.execute_move(mv);
        child.advance_turn();
        self.inflight.examined.fetch_add(1, Ordering::Relaxed);

        if child.legal_moves(child.side_to_move()).is_empty() {
            // Game over after this move. Shorten the shared deadline so
            // sibling tasks drain; their examined counts still aggregate.
            deadline.cancel();
            let best = BestMove { mv, value: evaluate(&child), terminal: true, examined: 1 };
            self.publish(best, objective);
            return Some(best);
        }

        let mut searcher = Searcher::new(
            self.cache.clone(),
            deadline.clone(),
            &self.config,
            self.progress_counter(),
        );
        let (value, reply) = searcher.search(&child, depth as i32 - 1, !maximize);
        if reply.is_none() && deadline.expired() {
            // Timed out with nothing evaluated on this branch.
            return None;
        }

        if let (Some(cache), Some(reply)) = (self.cache.as_ref(), reply) {
            cache.offer(
                &child.fingerprint(),
                objective.flip(),
                reply,
                value,
                searcher.examined,
            );
        }

        debug!("root {} -> {} ({} examined)", mv, value, searcher.examined);
        let best = BestMove { mv, value, terminal: false, examined: 1 + searcher.examined };
        self.publish(best, objective);
        Some(best)
    }

    /// Makes partial progress visible to pollers as tasks finish.
    fn publish(&self, candidate: BestMove, objective: Objective) {
        let mut guard = self.inflight.best.lock().unwrap();
        let better = match *guard {
            None => true,
            Some(cur) => candidate.terminal || objective.accepts(candidate.value, cur.value),
        };
        if better {
            *guard = Some(candidate);
        }
    }

    /// The searchers tick the shared examined counter directly, so pollers
    /// see progress while tasks run.
    fn progress_counter(&self) -> Arc<AtomicU64> {
        self.inflight.examined.clone()
    }

    fn should_escalate(&self, pos: &Position, side: Side) -> bool {
        let opponent = side.opponent();
        pos.material_count(opponent) == 1
            && has_kind(pos, side, Kind::Queen)
            && has_kind(pos, side, Kind::Rook)
    }

    /// Post-aggregation heuristics: break repetition streaks and unblock
    /// shuffling pawn endings. Replaces the move, never the search result's
    /// bookkeeping.
    fn apply_overrides(&self, pos: &Position, side: Side, mut chosen: BestMove) -> BestMove {
        if pos.check_draw_by_repetition(chosen.mv, REPETITION_LIMIT) {
            if let Some(substitute) = self.repetition_substitute(pos, side, chosen.mv) {
                debug!("repetition streak on {}; substituting {}", chosen.mv, substitute);
                chosen.mv = substitute;
                chosen.terminal = false;
                return chosen;
            }
        }

        if !pos.king_in_check(side) && self.shuffling_material(pos, side) {
            if let Some(unblock) = self.unblock_pawn(pos, side) {
                if unblock != chosen.mv {
                    debug!("unblocking pawn via {}", unblock);
                    chosen.mv = unblock;
                    chosen.terminal = false;
                }
            }
        }
        chosen
    }

    /// First available pawn move, else the first move by piece kind in
    /// queen, rook, bishop, knight, king order. Skips the move being
    /// replaced.
    fn repetition_substitute(&self, pos: &Position, side: Side, avoid: Move) -> Option<Move> {
        let moves = pos.legal_moves(side);
        let by_kind = |kind: Kind| {
            moves
                .iter()
                .copied()
                .find(|m| *m != avoid && pos.piece_at(m.from).kind() == kind)
        };
        by_kind(Kind::Pawn).or_else(|| SUBSTITUTE_ORDER.iter().find_map(|&k| by_kind(k)))
    }

    /// True when everything beyond pawns and king amounts to at most one
    /// minor piece, i.e. not enough force to make progress by shuffling.
    fn shuffling_material(&self, pos: &Position, side: Side) -> bool {
        let mut heavy = 0i32;
        for square in 0..64u8 {
            let piece = pos.piece_at(square);
            if piece.is_side(side) && !matches!(piece.kind(), Kind::Pawn | Kind::King) {
                heavy += 1;
                if heavy > 1 || piece.kind().weight() > Kind::Bishop.weight() {
                    return false;
                }
            }
        }
        true
    }

    /// Finds an own pawn blocked by an own piece directly ahead and moves
    /// that blocker if it has any legal move.
    fn unblock_pawn(&self, pos: &Position, side: Side) -> Option<Move> {
        let dir = side.forward();
        for square in 0..64u8 {
            let piece = pos.piece_at(square);
            if !piece.is_side(side) || piece.kind() != Kind::Pawn {
                continue;
            }
            let ahead_row = (square / 8) as i8 + dir;
            if !(0..8).contains(&ahead_row) {
                continue;
            }
            let ahead = (ahead_row as u8) * 8 + square % 8;
            if pos.piece_at(ahead).is_side(side) {
                if let Some(mv) = pos.legal_moves(side).iter().copied().find(|m| m.from == ahead)
                {
                    return Some(mv);
                }
            }
        }
        None
    }
}

fn has_kind(pos: &Position, side: Side, kind: Kind) -> bool {
    (0..64u8).any(|sq| {
        let piece = pos.piece_at(sq);
        piece.is_side(side) && piece.kind() == kind
    })
}
