//! Quoridor engine command line.
//!
//! ## Usage
//!
//! - `quoridor` - Show a demo
//! - `quoridor play` - Play at the console against the engine
//! - `quoridor selfplay` - Let the engine play itself and tally the results
//! - `quoridor demo` - Search the start position once

use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use flexi_logger::Logger;
use log::info;

use quoridor_mcts::constants::{DEFAULT_ITERATIONS, DEFAULT_TOTAL_WALLS};
use quoridor_mcts::mcts::{MctsAgent, SearchConfig};
use quoridor_mcts::playout::RewardMode;
use quoridor_mcts::session::{Seat, Session};
use quoridor_mcts::state::GameState;

/// Quoridor rules engine with a Monte Carlo Tree Search player
#[derive(Parser)]
#[command(name = "quoridor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play at the console against the engine
    Play {
        #[command(flatten)]
        game: GameArgs,
        /// Seats taken by people, comma separated
        #[arg(long, value_delimiter = ',', default_value = "0")]
        human_seats: Vec<usize>,
    },
    /// Let the engine play itself
    Selfplay {
        #[command(flatten)]
        game: GameArgs,
        /// Number of games to play
        #[arg(long, default_value_t = 1)]
        games: usize,
    },
    /// Run a single search from the start position
    Demo,
}

#[derive(Args)]
struct GameArgs {
    /// Number of players (2 or 4)
    #[arg(long, default_value_t = 2)]
    players: usize,
    /// Walls shared out between all players
    #[arg(long, default_value_t = DEFAULT_TOTAL_WALLS)]
    walls: u32,
    /// Search iterations per engine move
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    /// Per-move time limit in milliseconds
    #[arg(long)]
    time_ms: Option<u64>,
    /// Rollouts per expanded leaf, run in parallel when above 1
    #[arg(long, default_value_t = 1)]
    rollouts: usize,
    /// Weight rollout wins by how quickly they came
    #[arg(long)]
    depth_decay: bool,
    /// Chance of replaying a remembered reply during rollouts
    #[arg(long, default_value_t = 0.0)]
    reply_probability: f64,
    /// Seed for reproducible engine play
    #[arg(long)]
    seed: Option<u64>,
}

impl GameArgs {
    fn search_config(&self) -> SearchConfig {
        let mut config = SearchConfig {
            iterations: self.iterations,
            time_budget: self.time_ms.map(Duration::from_millis),
            rollouts_per_leaf: self.rollouts,
            ..SearchConfig::default()
        };
        if self.depth_decay {
            config.reward = RewardMode::DepthDecay;
        }
        config.rollout.reply_probability = self.reply_probability;
        config
    }

    fn agent(&self, stream: u64) -> MctsAgent {
        match self.seed {
            Some(seed) => MctsAgent::with_seed(self.search_config(), seed.wrapping_add(stream)),
            None => MctsAgent::new(self.search_config()),
        }
    }

    fn new_game(&self) -> anyhow::Result<GameState> {
        GameState::new(self.players, self.walls).context("cannot set up the game")
    }
}

fn main() -> anyhow::Result<()> {
    let _logger = Logger::try_with_env_or_str("info")?
        .format(flexi_logger::colored_default_format)
        .start()?;

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Play { game, human_seats }) => play(&game, &human_seats),
        Some(Commands::Selfplay { game, games }) => selfplay(&game, games),
        Some(Commands::Demo) | None => {
            run_demo();
            Ok(())
        }
    }
}

fn play(game: &GameArgs, human_seats: &[usize]) -> anyhow::Result<()> {
    let state = game.new_game()?;
    if let Some(&seat) = human_seats.iter().find(|&&s| s >= state.player_count()) {
        bail!("seat {seat} does not exist in a {} player game", state.player_count());
    }
    let seats = (0..state.player_count())
        .map(|seat| {
            if human_seats.contains(&seat) {
                Seat::Human
            } else {
                Seat::Bot(game.agent(seat as u64))
            }
        })
        .collect();

    println!("Moves: x,y to step, x,y,o for a wall (o: 0 horizontal, 1 vertical),");
    println!("x1,y1;x2,y2 to jump. 'o' lists legal moves, 'q' quits.");
    let mut session = Session::new(state, seats);
    session.run(io::stdin().lock(), io::stdout())?;
    Ok(())
}

fn selfplay(game: &GameArgs, games: usize) -> anyhow::Result<()> {
    let mut wins = vec![0usize; game.players];
    let mut unfinished = 0;
    for round in 0..games {
        let start = Instant::now();
        let state = game.new_game()?;
        let seats = (0..state.player_count())
            .map(|seat| Seat::Bot(game.agent((round * state.player_count() + seat) as u64)))
            .collect();
        let mut session = Session::new(state, seats).with_board(false);
        let winner = session.run(io::empty(), io::sink())?;
        match winner {
            Some(seat) => wins[seat] += 1,
            None => unfinished += 1,
        }
        info!(
            "game {}: winner {:?} in {:.1?}",
            round + 1,
            winner,
            start.elapsed()
        );
    }
    println!("wins per seat: {wins:?}, unfinished: {unfinished}");
    Ok(())
}

fn run_demo() {
    println!("Quoridor MCTS engine\n");

    let state = GameState::default();
    println!("{state}\n");

    let config = SearchConfig {
        iterations: 500,
        ..SearchConfig::default()
    };
    let mut agent = MctsAgent::new(config);
    println!("Running 500 MCTS iterations...");
    let tree = agent.search(&state);
    match tree.best_move() {
        Some(mv) => println!("Best move: {mv}"),
        None => println!("No move available"),
    }
    println!("Winrate: {:.1}%", tree.best_winrate() * 100.0);
}
