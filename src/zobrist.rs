//! Zobrist keys for position hashing.
//!
//! The keys are generated once from a fixed seed and shared read-only, so
//! every thread and every run sees the same hash for the same position.
//! A position hash XORs together:
//! - one key per cell for its wall and pawn bits (see [`HASH_MASK`])
//! - one key per seat for the cell its pawn stands on
//! - one key for the seat to move
//! - one key per seat for its remaining wall count

use std::sync::OnceLock;

use crate::constants::{HASH_MASK, MAX_PLAYERS, MAX_WALLS_PER_PLAYER, N, ZOBRIST_SEED};
use crate::moves::Position;

const CELL_VALUES: usize = HASH_MASK as usize + 1;
const WALL_COUNTS: usize = MAX_WALLS_PER_PLAYER as usize + 1;

pub struct ZobristKeys {
    grid: Box<[[u64; CELL_VALUES]]>,
    pawn: [[u64; N * N]; MAX_PLAYERS],
    turn: [u64; MAX_PLAYERS],
    walls: Box<[[u64; WALL_COUNTS]]>,
}

static KEYS: OnceLock<ZobristKeys> = OnceLock::new();

/// The shared key tables, built on first use.
#[inline]
pub fn keys() -> &'static ZobristKeys {
    KEYS.get_or_init(make_keys)
}

fn make_keys() -> ZobristKeys {
    let mut rng = fastrand::Rng::with_seed(ZOBRIST_SEED);
    let grid = (0..N * N)
        .map(|_| std::array::from_fn(|_| rng.u64(..)))
        .collect();
    let pawn = std::array::from_fn(|_| std::array::from_fn(|_| rng.u64(..)));
    let turn = std::array::from_fn(|_| rng.u64(..));
    let walls = (0..MAX_PLAYERS)
        .map(|_| std::array::from_fn(|_| rng.u64(..)))
        .collect();
    ZobristKeys {
        grid,
        pawn,
        turn,
        walls,
    }
}

#[inline]
fn cell_index((x, y): Position) -> usize {
    x * N + y
}

impl ZobristKeys {
    /// Key for a cell holding `flags`. Bits outside [`HASH_MASK`] are ignored.
    #[inline]
    pub fn cell(&self, pos: Position, flags: u8) -> u64 {
        self.grid[cell_index(pos)][(flags & HASH_MASK) as usize]
    }

    #[inline]
    pub fn pawn(&self, seat: usize, pos: Position) -> u64 {
        self.pawn[seat][cell_index(pos)]
    }

    #[inline]
    pub fn turn(&self, seat: usize) -> u64 {
        self.turn[seat]
    }

    #[inline]
    pub fn walls(&self, seat: usize, remaining: u32) -> u64 {
        self.walls[seat][remaining as usize]
    }

    /// XOR difference for a cell whose flags changed from `before` to `after`.
    #[inline]
    pub fn cell_delta(&self, pos: Position, before: u8, after: u8) -> u64 {
        self.cell(pos, before) ^ self.cell(pos, after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ILLEGAL_H, PAWN, WALL_N};

    #[test]
    fn test_keys_are_stable() {
        let a = keys().cell((3, 4), WALL_N);
        let b = make_keys().cell((3, 4), WALL_N);
        assert_eq!(a, b);
    }

    #[test]
    fn test_illegal_flags_do_not_hash() {
        let k = keys();
        assert_eq!(k.cell((2, 2), PAWN), k.cell((2, 2), PAWN | ILLEGAL_H));
        assert_eq!(k.cell_delta((2, 2), 0, ILLEGAL_H), 0);
    }

    #[test]
    fn test_keys_differ() {
        let k = keys();
        assert_ne!(k.turn(0), k.turn(1));
        assert_ne!(k.pawn(0, (4, 0)), k.pawn(1, (4, 0)));
        assert_ne!(k.walls(0, 10), k.walls(0, 9));
    }
}
