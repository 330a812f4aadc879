//! Console turn loop.
//!
//! A [`Session`] runs one game between seats that are either people typing
//! moves or [`MctsAgent`]s. Human input uses the move wire format:
//!
//! - `x,y,o` - wall at lattice point `(x, y)`, `o` = 0 horizontal, 1 vertical
//! - `x,y` - step to cell `(x, y)`
//! - `x1,y1;x2,y2` - jump over the pawn on `(x1, y1)` and land on `(x2, y2)`
//! - `o` - list the legal moves
//! - `q` - abandon the game
//!
//! Input that does not parse, or parses to an illegal move, is rejected and
//! the seat is asked again.

use std::io::{self, BufRead, Write};

use log::{error, info};

use crate::mcts::MctsAgent;
use crate::moves::{Move, parse_move};
use crate::state::GameState;

/// Turns after which a session gives up on a game.
pub const DEFAULT_MAX_TURNS: usize = 1000;

pub enum Seat {
    Human,
    Bot(MctsAgent),
}

pub struct Session {
    state: GameState,
    seats: Vec<Seat>,
    max_turns: usize,
    show_board: bool,
}

impl Session {
    /// `seats` must hold one entry per player in `state`.
    ///
    /// # Panics
    ///
    /// Panics if the seat count does not match `state.player_count()`.
    pub fn new(state: GameState, seats: Vec<Seat>) -> Self {
        assert_eq!(seats.len(), state.player_count(), "one seat per player");
        Self {
            state,
            seats,
            max_turns: DEFAULT_MAX_TURNS,
            show_board: true,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Whether the board is printed before every turn.
    pub fn with_board(mut self, show_board: bool) -> Self {
        self.show_board = show_board;
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Play until someone wins, a human quits, input runs out, or the turn
    /// limit is hit. Returns the winner if there is one.
    ///
    /// A move the engine refuses ends the session with an
    /// [`io::ErrorKind::Other`] error wrapping the
    /// [`GameError`](crate::state::GameError).
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> io::Result<Option<usize>> {
        let mut lines = input.lines();
        for turn in 0..self.max_turns {
            if self.state.over() {
                break;
            }
            if self.show_board {
                writeln!(out, "\n{}", self.state)?;
            }
            let seat = self.state.player_up();
            if self.state.legal_moves().is_empty() {
                writeln!(out, "player {seat} has no legal move and skips")?;
                self.state.skip_turn();
                continue;
            }

            let mv = match &mut self.seats[seat] {
                Seat::Bot(agent) => agent.choose_move(&self.state),
                Seat::Human => match ask_human(&self.state, seat, &mut lines, &mut out)? {
                    Some(mv) => Some(mv),
                    None => {
                        writeln!(out, "game abandoned")?;
                        return Ok(None);
                    }
                },
            };
            let Some(mv) = mv else {
                writeln!(out, "player {seat} skips")?;
                self.state.skip_turn();
                continue;
            };

            writeln!(out, "player {seat} plays {mv}")?;
            self.apply(turn, mv)?;
        }

        match self.state.winner() {
            Some(seat) => {
                if self.show_board {
                    writeln!(out, "\n{}", self.state)?;
                }
                writeln!(out, "player {seat} wins")?;
                info!("player {seat} wins");
            }
            None => writeln!(out, "no winner after {} turns", self.max_turns)?,
        }
        Ok(self.state.winner())
    }

    fn apply(&mut self, turn: usize, mv: Move) -> io::Result<()> {
        let seat = self.state.player_up();
        self.state.play_move(mv).map_err(|e| {
            error!("turn {turn}: player {seat} could not play {mv}: {e}");
            io::Error::other(e)
        })
    }
}

/// Read lines until one is a legal move. `None` when the player quits or
/// input ends.
fn ask_human<I, W>(state: &GameState, seat: usize, lines: &mut I, out: &mut W) -> io::Result<Option<Move>>
where
    I: Iterator<Item = io::Result<String>>,
    W: Write,
{
    loop {
        write!(out, "player {seat}> ")?;
        out.flush()?;
        let Some(line) = lines.next() else {
            return Ok(None);
        };
        let line = line?;
        match line.trim() {
            "" => continue,
            "q" | "quit" => return Ok(None),
            "o" | "options" => {
                let moves: Vec<String> = state.legal_moves().iter().map(Move::to_string).collect();
                writeln!(out, "{}", moves.join("  "))?;
            }
            text => match parse_move(text) {
                None => writeln!(out, "could not read {text:?}, expected x,y or x,y,o or x1,y1;x2,y2")?,
                Some(mv) if !state.is_legal(mv) => writeln!(out, "illegal move {mv}")?,
                Some(mv) => return Ok(Some(mv)),
            },
        }
    }
}
