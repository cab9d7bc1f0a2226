use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use sable::search::MoveCache;
use sable::{Position, SearchConfig, SearchEngine, Side};

#[derive(Parser, Debug)]
#[command(author, version, about = "Search a chess position with the sable engine", long_about = None)]
struct Args {
    /// Placement string: 64 tokens row-major ('PNBRQK' side A, 'pnbrqk'
    /// side B, space empty, '/' between rows). Default: starting position
    #[arg(long)]
    placement: Option<String>,

    /// Side to move: 'a' or 'b'
    #[arg(long, default_value = "a")]
    side: String,

    /// Search depth in plies (overrides the config file)
    #[arg(long)]
    depth: Option<u32>,

    /// Per-move time budget in seconds, 0 = unbounded (overrides config)
    #[arg(long)]
    movetime: Option<u64>,

    /// JSON file holding a SearchConfig
    #[arg(long)]
    config: Option<PathBuf>,

    /// Instead of a single search, let the engine play this many half-moves
    /// against itself
    #[arg(long, default_value_t = 0)]
    selfplay: u32,

    /// Cache snapshot to import before searching
    #[arg(long)]
    cache_in: Option<PathBuf>,

    /// Where to export the cache snapshot afterwards
    #[arg(long)]
    cache_out: Option<PathBuf>,

    /// Print cache statistics as JSON when done
    #[arg(long)]
    stats: bool,
}

fn parse_side(side_str: &str) -> Result<Side> {
    match side_str.to_lowercase().as_str() {
        "a" => Ok(Side::A),
        "b" => Ok(Side::B),
        _ => anyhow::bail!("Invalid side: use 'a' or 'b'"),
    }
}

fn print_board(pos: &Position) {
    // Row 7 on top so side A plays "up" the printed board.
    println!("  +-----------------+");
    for row in (0u8..8).rev() {
        print!("{} | ", row + 1);
        for col in 0u8..8 {
            let token = pos.piece_at(row * 8 + col).token();
            print!("{} ", if token == ' ' { '.' } else { token });
        }
        println!("|");
    }
    println!("  +-----------------+");
    println!("    a b c d e f g h");
}

fn load_config(args: &Args) -> Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text).context("parsing config JSON")?
        }
        None => SearchConfig::default(),
    };
    if let Some(depth) = args.depth {
        config.depth = depth;
    }
    if let Some(movetime) = args.movetime {
        config.move_time_secs = movetime;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let side = parse_side(&args.side)?;
    let mut pos = match &args.placement {
        Some(text) => Position::from_placement(text, side).context("parsing placement")?,
        None => {
            let mut p = Position::startpos();
            p.set_side_to_move(side);
            p
        }
    };

    let cache = config.use_cache.then(|| Arc::new(MoveCache::new()));
    if let (Some(cache), Some(path)) = (&cache, &args.cache_in) {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let imported = cache.import_snapshot(&bytes).context("decoding snapshot")?;
        println!("Imported {} cached entries", imported);
    }
    let engine = SearchEngine::with_cache(config, cache.clone());

    let half_moves = args.selfplay.max(1);
    for ply in 0..half_moves {
        print_board(&pos);
        println!(
            "{:?} to move (turn {})",
            pos.side_to_move(),
            pos.turn()
        );

        let start = Instant::now();
        let Some(best) = engine.choose_move(&pos) else {
            if pos.king_in_check(pos.side_to_move()) {
                println!("Checkmate: {:?} loses", pos.side_to_move());
            } else {
                println!("No move available for {:?}", pos.side_to_move());
            }
            break;
        };
        println!(
            "Engine plays {} (value {}, {} examined, {:.2}s)",
            best.mv,
            best.value,
            best.examined,
            start.elapsed().as_secs_f32()
        );

        pos.execute_move(best.mv);
        pos.advance_turn();
        if best.terminal {
            print_board(&pos);
            println!("Game over after {} half-moves", ply + 1);
            break;
        }
    }

    if let (Some(cache), Some(path)) = (&cache, &args.cache_out) {
        std::fs::write(path, cache.export_snapshot())
            .with_context(|| format!("writing snapshot {}", path.display()))?;
    }
    if args.stats {
        if let Some(cache) = &cache {
            println!("{}", serde_json::to_string_pretty(&cache.stats())?);
        }
    }
    Ok(())
}
