//! Quoridor rules engine and Monte Carlo Tree Search player.
//!
//! The engine keeps the set of legal wall placements up to date move by move
//! instead of re-checking every placement against every pawn, and the search
//! plays from cloned states so the authoritative game is never touched.
//!
//! ## Modules
//!
//! - [`constants`] - Board geometry, cell flags, and engine parameters
//! - [`moves`] - Moves, wall placements, and the text wire format
//! - [`board`] - Cell grid with wall flags and path searches
//! - [`state`] - Game rules and incremental wall legality
//! - [`zobrist`] - Position hashing
//! - [`reply_table`] - Remembered good replies per position
//! - [`playout`] - Rollout policies
//! - [`mcts`] - Monte Carlo Tree Search
//! - [`session`] - Console turn loop
//!
//! ## Example
//!
//! ```
//! use quoridor_mcts::mcts::{MctsAgent, SearchConfig};
//! use quoridor_mcts::moves::parse_move;
//! use quoridor_mcts::state::GameState;
//!
//! // Start a two-player game and step forward
//! let mut state = GameState::default();
//! state.play_move(parse_move("4,1").unwrap()).unwrap();
//!
//! // Let the engine answer
//! let config = SearchConfig { iterations: 100, ..SearchConfig::default() };
//! let mut agent = MctsAgent::with_seed(config, 42);
//! let reply = agent.choose_move(&state).unwrap();
//! state.play_move(reply).unwrap();
//! println!("Engine played {reply}");
//! ```

pub mod board;
pub mod constants;
pub mod mcts;
pub mod moves;
pub mod playout;
pub mod reply_table;
pub mod session;
pub mod state;
pub mod zobrist;
