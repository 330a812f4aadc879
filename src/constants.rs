//! Constants for board geometry, cell flags, and search parameters.
//!
//! The board is a fixed 9x9 grid of cells indexed `[x][y]`, with north at
//! `y + 1` and east at `x + 1`. Wall placements live on the 8x8 lattice of
//! interior corners.

// =============================================================================
// Board Geometry
// =============================================================================

/// Board size (NxN cells).
pub const N: usize = 9;

/// Placement lattice size. A placement `(x, y)` is centred on corner `(x+1, y+1)`.
pub const LATTICE: usize = N - 1;

/// Number of distinct wall placements (two orientations over the lattice).
pub const PLACEMENT_COUNT: usize = 2 * LATTICE * LATTICE;

/// Corners per side of the full corner grid, border corners included.
pub const CORNERS: usize = N + 1;

// =============================================================================
// Cell Flags
// =============================================================================

/// Edge towards `y + 1` is blocked.
pub const WALL_N: u8 = 1;

/// Edge towards `x + 1` is blocked.
pub const WALL_E: u8 = 2;

/// Edge towards `y - 1` is blocked.
pub const WALL_S: u8 = 4;

/// Edge towards `x - 1` is blocked.
pub const WALL_W: u8 = 8;

/// Horizontal placement anchored at this cell is known to cut someone off.
pub const ILLEGAL_H: u8 = 16;

/// Vertical placement anchored at this cell is known to cut someone off.
pub const ILLEGAL_V: u8 = 32;

/// A pawn stands on this cell.
pub const PAWN: u8 = 64;

/// Bits that take part in the position hash. Illegal flags are derived data.
pub const HASH_MASK: u8 = WALL_N | WALL_E | WALL_S | WALL_W | PAWN;

// =============================================================================
// Game Setup
// =============================================================================

/// Walls shared out between the players of a standard game.
pub const DEFAULT_TOTAL_WALLS: u32 = 20;

/// Largest supported table.
pub const MAX_PLAYERS: usize = 4;

/// Per-player wall ceiling. Bounds the Zobrist wall-count table.
pub const MAX_WALLS_PER_PLAYER: u32 = 100;

// =============================================================================
// MCTS Parameters
// =============================================================================

/// Default number of search iterations per move.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Exploration constant for UCT.
pub const UCT_C: f64 = 1.414;

/// Early evaluation fires once the leader is this many steps ahead.
pub const EARLY_EVAL_MARGIN: usize = 2;

/// Probability that the weighted rollout policy picks a pawn move over a wall.
pub const DEFAULT_PAWN_BIAS: f64 = 0.3;

/// Rollouts give up after this many plies and adjudicate by path length.
pub const MAX_ROLLOUT_MOVES: usize = 400;

// =============================================================================
// Reply Table
// =============================================================================

/// Positions kept by the opponent-reply table before LRU eviction.
pub const REPLY_TABLE_STATES: usize = 100_000;

/// Replies remembered per position.
pub const REPLY_TABLE_PER_STATE: usize = 6;

/// Seed for the Zobrist key tables.
pub const ZOBRIST_SEED: u64 = 0x9E37_79B9_7F4A_7C15;
