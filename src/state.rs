//! Game rules, move execution, and incremental wall legality.
//!
//! [`GameState`] owns the board, the players, and the set of open wall
//! placements. The open set always holds exactly the placements that are
//! unplayed, do not physically overlap a played wall, and would leave every
//! pawn a route to its goal. Rather than re-testing all 128 placements after
//! every move, the state keeps each player's shortest path and the set of
//! placements cutting it, and only re-probes the few placements a move could
//! have affected:
//!
//! - a wall can only make a placement illegal if that placement would close a
//!   loop through the new wall, which needs two of its anchors in the new
//!   wall's connected structure, and if it cuts somebody's cached path
//! - a pawn move can only change the legality of placements that cut one of
//!   the edges the pawn just crossed

use std::fmt;

use log::trace;
use thiserror::Error;

use crate::board::BoardGrid;
use crate::constants::{DEFAULT_TOTAL_WALLS, MAX_PLAYERS, MAX_WALLS_PER_PLAYER, N};
use crate::moves::{Move, Placement, PlacementSet, Position, blockers_of, edge_cutters};
use crate::zobrist;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("illegal move {0}")]
    IllegalMove(Move),
    #[error("the game is already over")]
    GameOver,
    #[error("unsupported player count {0}, expected 2 or 4")]
    UnsupportedPlayerCount(usize),
    #[error("{0} walls per player is more than the board supports")]
    TooManyWalls(u32),
}

const START_POSITIONS: [Position; MAX_PLAYERS] = [(4, 0), (4, N - 1), (0, 4), (N - 1, 4)];

const fn goal_edge(seat: usize) -> [Position; N] {
    let mut cells = [(0, 0); N];
    let mut i = 0;
    while i < N {
        cells[i] = match seat {
            0 => (i, N - 1),
            1 => (i, 0),
            2 => (N - 1, i),
            _ => (0, i),
        };
        i += 1;
    }
    cells
}

/// Goal cells per seat: the edge opposite the starting one.
static GOALS: [[Position; N]; MAX_PLAYERS] = [goal_edge(0), goal_edge(1), goal_edge(2), goal_edge(3)];

#[derive(Clone, Debug)]
pub struct PlayerState {
    pub position: Position,
    pub walls_remaining: u32,
    pub goals: &'static [Position],
    /// Shortest route from `position` to a goal cell, both ends included.
    pub path: Vec<Position>,
    /// Placements that would cut an edge of `path`.
    pub blockers: PlacementSet,
}

impl PlayerState {
    /// Steps left along the cached path.
    #[inline]
    pub fn distance(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// A Quoridor position: pawns, walls, turn, and the derived legality data.
#[derive(Clone, Debug)]
pub struct GameState {
    player_count: usize,
    players: Vec<PlayerState>,
    player_up: usize,
    open: PlacementSet,
    walls_remaining: u32,
    over: bool,
    winner: Option<usize>,
    board: BoardGrid,
    hash: Option<u64>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::start(2, DEFAULT_TOTAL_WALLS / 2)
    }
}

impl GameState {
    /// Set up the start position with walls split evenly between the seats.
    pub fn new(player_count: usize, total_walls: u32) -> Result<Self, GameError> {
        if player_count != 2 && player_count != MAX_PLAYERS {
            return Err(GameError::UnsupportedPlayerCount(player_count));
        }
        let per_player = total_walls / player_count as u32;
        if per_player > MAX_WALLS_PER_PLAYER {
            return Err(GameError::TooManyWalls(per_player));
        }
        Ok(Self::start(player_count, per_player))
    }

    fn start(player_count: usize, per_player: u32) -> Self {
        let mut board = BoardGrid::new();
        let players = (0..player_count)
            .map(|seat| {
                let position = START_POSITIONS[seat];
                board.add_pawn(position);
                PlayerState {
                    position,
                    walls_remaining: per_player,
                    goals: &GOALS[seat],
                    path: Vec::new(),
                    blockers: PlacementSet::EMPTY,
                }
            })
            .collect();

        let walls_remaining = per_player * player_count as u32;
        let mut state = Self {
            player_count,
            players,
            player_up: 0,
            open: if walls_remaining > 0 { PlacementSet::FULL } else { PlacementSet::EMPTY },
            walls_remaining,
            over: false,
            winner: None,
            board,
            hash: None,
        };
        for seat in 0..player_count {
            state.refresh_path(seat);
        }
        state
    }

    pub fn player_count(&self) -> usize {
        self.player_count
    }

    /// Seat whose turn it is.
    pub fn player_up(&self) -> usize {
        self.player_up
    }

    pub fn over(&self) -> bool {
        self.over
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn player(&self, seat: usize) -> &PlayerState {
        &self.players[seat]
    }

    pub fn board(&self) -> &BoardGrid {
        &self.board
    }

    /// Walls left in the game, summed over all seats.
    pub fn walls_remaining(&self) -> u32 {
        self.walls_remaining
    }

    /// Placements currently legal for a seat that still has walls.
    pub fn open_placements(&self) -> PlacementSet {
        self.open
    }

    pub fn has_won(&self, seat: usize) -> bool {
        let player = &self.players[seat];
        player.goals.contains(&player.position)
    }

    // =========================================================================
    // Move generation
    // =========================================================================

    /// All legal moves for the seat to move: walls first, then pawn moves.
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.over {
            return Vec::new();
        }
        let mut moves: Vec<Move> = self.legal_placements().iter().map(Move::Wall).collect();
        moves.extend(self.legal_pawn_moves());
        moves
    }

    /// Open placements if the seat to move still has walls, else none.
    pub fn legal_placements(&self) -> PlacementSet {
        if self.players[self.player_up].walls_remaining > 0 {
            self.open
        } else {
            PlacementSet::EMPTY
        }
    }

    /// Pawn moves for the seat to move, including straight and diagonal jumps.
    pub fn legal_pawn_moves(&self) -> Vec<Move> {
        let start = self.players[self.player_up].position;
        let mut moves = Vec::with_capacity(5);
        for next in self.board.neighbors(start) {
            if !self.board.is_occupied(next) {
                moves.push(Move::Step(next));
                continue;
            }
            let beyond = ((2 * next.0).wrapping_sub(start.0), (2 * next.1).wrapping_sub(start.1));
            let straight = self.board.is_adjacent_open(next, beyond) && !self.board.is_occupied(beyond);
            if straight {
                moves.push(Move::Jump(next, beyond));
                continue;
            }
            for side in self.board.neighbors(next) {
                if side != start && !self.board.is_occupied(side) {
                    moves.push(Move::Jump(next, side));
                }
            }
        }
        moves
    }

    /// Whether `mv` could be played by the seat to move right now.
    pub fn is_legal(&self, mv: Move) -> bool {
        if self.over {
            return false;
        }
        match mv {
            Move::Wall(p) => self.players[self.player_up].walls_remaining > 0 && self.open.contains(p),
            Move::Step(_) | Move::Jump(_, _) => self.legal_pawn_moves().contains(&mv),
        }
    }

    /// The pawn move that follows the cached shortest path, if one is legal.
    pub fn fastest_pawn_move(&self) -> Option<Move> {
        let path = &self.players[self.player_up].path;
        let moves = self.legal_pawn_moves();
        let step = path.get(1).copied();
        let jump = path.get(2).copied();
        moves
            .iter()
            .copied()
            .find(|m| matches!(m, Move::Step(to) if Some(*to) == step))
            .or_else(|| {
                moves
                    .iter()
                    .copied()
                    .find(|m| matches!(m, Move::Jump(_, to) if Some(*to) == jump))
            })
            .or_else(|| {
                let goals = self.players[self.player_up].goals;
                moves.iter().copied().min_by_key(|m| {
                    m.destination()
                        .and_then(|to| self.board.astar_distance(to, goals))
                        .unwrap_or(usize::MAX)
                })
            })
    }

    /// Seat with the shortest remaining path. Ties go to the lower seat.
    pub fn leader(&self) -> usize {
        self.players
            .iter()
            .enumerate()
            .min_by_key(|(seat, p)| (p.distance(), *seat))
            .map(|(seat, _)| seat)
            .unwrap_or(0)
    }

    // =========================================================================
    // Move execution
    // =========================================================================

    /// Play a move for the seat to move, then pass the turn on.
    pub fn play_move(&mut self, mv: Move) -> Result<(), GameError> {
        if self.over {
            return Err(GameError::GameOver);
        }
        let mover = self.player_up;
        match mv {
            Move::Wall(p) => self.play_wall(p)?,
            Move::Step(_) | Move::Jump(_, _) => {
                self.play_pawn(mv)?;
                if self.has_won(mover) {
                    self.over = true;
                    self.winner = Some(mover);
                }
            }
        }
        self.advance_turn();
        Ok(())
    }

    /// Pass the turn without moving. For seats left with no legal move.
    pub fn skip_turn(&mut self) {
        self.advance_turn();
    }

    fn advance_turn(&mut self) {
        let next = (self.player_up + 1) % self.player_count;
        let keys = zobrist::keys();
        self.rehash(keys.turn(self.player_up) ^ keys.turn(next));
        self.player_up = next;
    }

    fn play_wall(&mut self, p: Placement) -> Result<(), GameError> {
        let mover = self.player_up;
        if self.players[mover].walls_remaining == 0 || !self.open.contains(p) {
            return Err(GameError::IllegalMove(Move::Wall(p)));
        }

        let touching = self.board.touching_anchors(p);
        let touches = touching.iter().filter(|&&t| t).count();

        self.place_wall(p);
        let left = self.players[mover].walls_remaining;
        self.set_walls(mover, left - 1);
        self.walls_remaining -= 1;

        for seat in 0..self.player_count {
            if self.players[seat].blockers.contains(p) {
                self.refresh_path(seat);
            }
        }

        if self.walls_remaining == 0 {
            self.open.clear();
            return Ok(());
        }

        for q in p.overlaps() {
            self.open.remove(q);
            self.board.unmark_illegal(q);
        }

        if touches == 0 {
            return Ok(());
        }

        let pool: PlacementSet = if touches == 1 {
            BoardGrid::anchors(p)
                .into_iter()
                .zip(touching)
                .filter(|&(_, touched)| !touched)
                .flat_map(|(corner, _)| BoardGrid::placements_anchored_at(corner))
                .collect()
        } else {
            self.open
        };
        let contested = self
            .players
            .iter()
            .fold(PlacementSet::EMPTY, |acc, pl| acc | pl.blockers);
        let structure = self.board.wall_structure(p);

        let mut probed = 0;
        for q in pool & self.open & contested {
            let linked = BoardGrid::anchors(q)
                .into_iter()
                .filter(|&c| structure.contains(c))
                .count();
            if linked < 2 {
                continue;
            }
            probed += 1;
            if !self.probe(q) {
                trace!("wall {p} closes off {q}");
                self.board.mark_illegal(q);
                self.open.remove(q);
            }
        }
        trace!("wall {p}: touches={touches} probed={probed} open={}", self.open.len());
        Ok(())
    }

    fn play_pawn(&mut self, mv: Move) -> Result<(), GameError> {
        if !self.legal_pawn_moves().contains(&mv) {
            return Err(GameError::IllegalMove(mv));
        }
        let mover = self.player_up;
        let from = self.players[mover].position;
        let (crossed, to) = match mv {
            Move::Step(to) => ([Some((from, to)), None], to),
            Move::Jump(over, to) => ([Some((from, over)), Some((over, to))], to),
            Move::Wall(_) => return Err(GameError::IllegalMove(mv)),
        };

        self.move_pawn(mover, from, to);

        let player = &mut self.players[mover];
        match player.path.iter().position(|&cell| cell == to) {
            Some(k) => {
                player.path.drain(..k);
                player.blockers = blockers_of(&player.path);
            }
            None => self.refresh_path(mover),
        }

        if self.walls_remaining == 0 {
            return Ok(());
        }
        let touched: PlacementSet = crossed
            .into_iter()
            .flatten()
            .flat_map(|(a, b)| edge_cutters(a, b))
            .collect();
        for q in touched {
            if self.board.is_illegal(q) {
                if self.probe(q) {
                    trace!("pawn move {mv} reopens {q}");
                    self.board.unmark_illegal(q);
                    self.open.insert(q);
                }
            } else if self.open.contains(q) && !self.probe(q) {
                trace!("pawn move {mv} closes {q}");
                self.board.mark_illegal(q);
                self.open.remove(q);
            }
        }
        Ok(())
    }

    /// Whether `q` leaves every seat a route to goal. Only seats whose cached
    /// path `q` cuts can lose their route, so only those are searched.
    fn probe(&mut self, q: Placement) -> bool {
        self.board.add_wall(q);
        let board = &self.board;
        let legal = self
            .players
            .iter()
            .filter(|pl| pl.blockers.contains(q))
            .all(|pl| board.are_connected_greedy(pl.position, pl.goals));
        self.board.remove_wall(q);
        legal
    }

    fn refresh_path(&mut self, seat: usize) {
        let player = &self.players[seat];
        let path = match self.board.astar_full_path(player.position, player.goals) {
            Some(path) => path,
            None => panic!(
                "seat {seat} at {:?} has no route to goal:\n{}",
                player.position, self.board
            ),
        };
        let player = &mut self.players[seat];
        player.blockers = blockers_of(&path);
        player.path = path;
    }

    // =========================================================================
    // Early evaluation
    // =========================================================================

    /// Winner implied by path lengths once no walls are left to play: the
    /// leader wins when at least `margin` steps ahead of everyone else.
    pub fn evaluate_early(&self, margin: usize) -> Option<usize> {
        if self.walls_remaining > 0 {
            return None;
        }
        let mut lengths: Vec<(usize, usize)> = self
            .players
            .iter()
            .enumerate()
            .map(|(seat, p)| (p.distance(), seat))
            .collect();
        lengths.sort_unstable();
        let (lowest, seat) = lengths[0];
        let second = lengths[1].0;
        (second >= lowest + margin).then_some(seat)
    }

    /// Apply [`evaluate_early`](Self::evaluate_early). Returns whether the game is decided.
    pub fn try_early_eval(&mut self, margin: usize) -> bool {
        if self.over {
            return true;
        }
        match self.evaluate_early(margin) {
            Some(seat) => {
                self.over = true;
                self.winner = Some(seat);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    /// Zobrist hash of the position. Computed in full on first call and kept
    /// up to date by every move after that.
    pub fn hash(&mut self) -> u64 {
        if let Some(h) = self.hash {
            return h;
        }
        let h = self.full_hash();
        self.hash = Some(h);
        h
    }

    /// Hash computed from scratch, ignoring the cached value.
    pub fn full_hash(&self) -> u64 {
        let keys = zobrist::keys();
        let mut h = keys.turn(self.player_up);
        for x in 0..N {
            for y in 0..N {
                h ^= keys.cell((x, y), self.board.cell((x, y)));
            }
        }
        for (seat, p) in self.players.iter().enumerate() {
            h ^= keys.pawn(seat, p.position) ^ keys.walls(seat, p.walls_remaining);
        }
        h
    }

    #[inline]
    fn rehash(&mut self, delta: u64) {
        if let Some(h) = self.hash.as_mut() {
            *h ^= delta;
        }
    }

    fn place_wall(&mut self, p: Placement) {
        let cells = p.footprint();
        let before = cells.map(|c| self.board.cell(c));
        self.board.add_wall(p);
        let keys = zobrist::keys();
        let delta = cells
            .iter()
            .zip(before)
            .fold(0, |acc, (&c, old)| acc ^ keys.cell_delta(c, old, self.board.cell(c)));
        self.rehash(delta);
    }

    fn move_pawn(&mut self, seat: usize, from: Position, to: Position) {
        let keys = zobrist::keys();
        let (old_from, old_to) = (self.board.cell(from), self.board.cell(to));
        self.board.remove_pawn(from);
        self.board.add_pawn(to);
        let delta = keys.cell_delta(from, old_from, self.board.cell(from))
            ^ keys.cell_delta(to, old_to, self.board.cell(to))
            ^ keys.pawn(seat, from)
            ^ keys.pawn(seat, to);
        self.rehash(delta);
        self.players[seat].position = to;
    }

    fn set_walls(&mut self, seat: usize, remaining: u32) {
        let keys = zobrist::keys();
        let old = self.players[seat].walls_remaining;
        self.rehash(keys.walls(seat, old) ^ keys.walls(seat, remaining));
        self.players[seat].walls_remaining = remaining;
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let board = self.board.render(|pos| {
            self.players
                .iter()
                .position(|p| p.position == pos)
                .and_then(|seat| char::from_digit(seat as u32, 10))
        });
        f.write_str(&board)?;
        let walls: Vec<String> = self
            .players
            .iter()
            .map(|p| p.walls_remaining.to_string())
            .collect();
        write!(
            f,
            "to move: {}  walls: [{}]  open placements: {}",
            self.player_up,
            walls.join(", "),
            self.open.len()
        )
    }
}
