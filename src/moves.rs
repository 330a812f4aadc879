//! Move representation, placement sets, and the text wire format.
//!
//! A move is either a wall placement `x,y,o`, a single step `x,y`, or a jump
//! `x1,y1;x2,y2` naming the jumped-over cell and the landing cell.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::constants::{LATTICE, N, PLACEMENT_COUNT};

/// Cell coordinate `(x, y)`, both in `0..9`.
pub type Position = (usize, usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    Horizontal = 0,
    Vertical = 1,
}

/// A wall centred on lattice corner `(x + 1, y + 1)`.
///
/// Horizontal walls block the north edges of `(x, y)` and `(x + 1, y)`.
/// Vertical walls block the east edges of `(x, y)` and `(x, y + 1)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Placement {
    pub x: usize,
    pub y: usize,
    pub orientation: Orientation,
}

impl Placement {
    pub const fn new(x: usize, y: usize, orientation: Orientation) -> Self {
        Self { x, y, orientation }
    }

    pub const fn horizontal(x: usize, y: usize) -> Self {
        Self::new(x, y, Orientation::Horizontal)
    }

    pub const fn vertical(x: usize, y: usize) -> Self {
        Self::new(x, y, Orientation::Vertical)
    }

    /// Dense index in `0..128`.
    #[inline]
    pub fn index(self) -> usize {
        (self.orientation as usize) * LATTICE * LATTICE + self.y * LATTICE + self.x
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        let orientation = if index >= LATTICE * LATTICE {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        };
        let rem = index % (LATTICE * LATTICE);
        Self::new(rem % LATTICE, rem / LATTICE, orientation)
    }

    /// Every placement on the lattice, in index order.
    pub fn all() -> impl Iterator<Item = Placement> {
        (0..PLACEMENT_COUNT).map(Placement::from_index)
    }

    /// The four cells whose flags the wall touches.
    pub fn footprint(self) -> [Position; 4] {
        let (x, y) = (self.x, self.y);
        [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)]
    }

    /// Placements that can no longer be played once this one is on the board:
    /// itself, the same-orientation neighbours sharing a segment, and the
    /// crossing wall at the same corner.
    pub fn overlaps(self) -> impl Iterator<Item = Placement> {
        let (x, y, o) = (self.x, self.y, self.orientation);
        let (along, crossing) = match o {
            Orientation::Horizontal => (
                [
                    x.checked_sub(1).map(|nx| Placement::horizontal(nx, y)),
                    Some(self),
                    (x + 1 < LATTICE).then(|| Placement::horizontal(x + 1, y)),
                ],
                Placement::vertical(x, y),
            ),
            Orientation::Vertical => (
                [
                    y.checked_sub(1).map(|ny| Placement::vertical(x, ny)),
                    Some(self),
                    (y + 1 < LATTICE).then(|| Placement::vertical(x, y + 1)),
                ],
                Placement::horizontal(x, y),
            ),
        };
        along.into_iter().flatten().chain(std::iter::once(crossing))
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.orientation as usize)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Move {
    Wall(Placement),
    Step(Position),
    /// `(over, landing)`: the jumped pawn's cell, then where the mover ends up.
    Jump(Position, Position),
}

impl Move {
    /// Landing cell of a pawn move.
    pub fn destination(&self) -> Option<Position> {
        match *self {
            Move::Wall(_) => None,
            Move::Step(to) | Move::Jump(_, to) => Some(to),
        }
    }

    pub fn is_wall(&self) -> bool {
        matches!(self, Move::Wall(_))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Wall(p) => write!(f, "{p}"),
            Move::Step((x, y)) => write!(f, "{x},{y}"),
            Move::Jump((x1, y1), (x2, y2)) => write!(f, "{x1},{y1};{x2},{y2}"),
        }
    }
}

fn parse_position(fields: &[usize]) -> Option<Position> {
    match *fields {
        [x, y] if x < N && y < N => Some((x, y)),
        _ => None,
    }
}

/// Parse a move in wire format.
///
/// Returns `None` for anything malformed or off the board; legality against
/// a particular position is checked by the game state, not here.
pub fn parse_move(text: &str) -> Option<Move> {
    let groups: Vec<Vec<usize>> = text
        .trim()
        .split(';')
        .map(|group| {
            group
                .split(',')
                .map(|field| field.trim().parse::<usize>().ok())
                .collect::<Option<Vec<_>>>()
        })
        .collect::<Option<Vec<_>>>()?;

    match groups.as_slice() {
        [single] if single.len() == 3 => {
            let (x, y) = (single[0], single[1]);
            if x >= LATTICE || y >= LATTICE {
                return None;
            }
            let orientation = match single[2] {
                0 => Orientation::Horizontal,
                1 => Orientation::Vertical,
                _ => return None,
            };
            Some(Move::Wall(Placement::new(x, y, orientation)))
        }
        [single] => parse_position(single).map(Move::Step),
        [over, landing] => Some(Move::Jump(parse_position(over)?, parse_position(landing)?)),
        _ => None,
    }
}

/// Placements that would sever the edge between two orthogonally adjacent cells.
pub fn edge_cutters(a: Position, b: Position) -> impl Iterator<Item = Placement> {
    let (lo, hi) = if (a.0, a.1) <= (b.0, b.1) { (a, b) } else { (b, a) };
    let cutters: [Option<Placement>; 2] = if lo.0 == hi.0 {
        // North edge of `lo`: horizontal walls whose span covers column x.
        let (x, y) = lo;
        [
            (x < LATTICE).then(|| Placement::horizontal(x, y)),
            x.checked_sub(1).map(|px| Placement::horizontal(px, y)),
        ]
    } else {
        let (x, y) = lo;
        [
            (y < LATTICE).then(|| Placement::vertical(x, y)),
            y.checked_sub(1).map(|py| Placement::vertical(x, py)),
        ]
    };
    cutters.into_iter().flatten()
}

/// Every placement that cuts at least one edge of `path`.
pub fn blockers_of(path: &[Position]) -> PlacementSet {
    path.windows(2)
        .flat_map(|step| edge_cutters(step[0], step[1]))
        .collect()
}

// =============================================================================
// Placement Set
// =============================================================================

/// Set of placements as a 128-bit mask, one bit per placement index.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PlacementSet(u128);

impl PlacementSet {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self(u128::MAX);

    #[inline]
    pub fn contains(&self, p: Placement) -> bool {
        self.0 & (1u128 << p.index()) != 0
    }

    /// Returns whether the placement was newly added.
    #[inline]
    pub fn insert(&mut self, p: Placement) -> bool {
        let bit = 1u128 << p.index();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    /// Returns whether the placement was present.
    #[inline]
    pub fn remove(&mut self, p: Placement) -> bool {
        let bit = 1u128 << p.index();
        let present = self.0 & bit != 0;
        self.0 &= !bit;
        present
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn iter(&self) -> PlacementIter {
        PlacementIter(self.0)
    }

    /// The `k`-th placement in index order.
    pub fn nth(&self, k: usize) -> Option<Placement> {
        self.iter().nth(k)
    }
}

impl BitOr for PlacementSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PlacementSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PlacementSet {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl FromIterator<Placement> for PlacementSet {
    fn from_iter<I: IntoIterator<Item = Placement>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for p in iter {
            set.insert(p);
        }
        set
    }
}

impl IntoIterator for PlacementSet {
    type Item = Placement;
    type IntoIter = PlacementIter;
    fn into_iter(self) -> PlacementIter {
        self.iter()
    }
}

pub struct PlacementIter(u128);

impl Iterator for PlacementIter {
    type Item = Placement;

    fn next(&mut self) -> Option<Placement> {
        if self.0 == 0 {
            return None;
        }
        let index = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(Placement::from_index(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_covers_all_placements() {
        let all: PlacementSet = Placement::all().collect();
        assert_eq!(all, PlacementSet::FULL);
        assert_eq!(all.len(), PLACEMENT_COUNT);
        for p in Placement::all() {
            assert_eq!(Placement::from_index(p.index()), p);
        }
    }

    #[test]
    fn test_parse_wall() {
        assert_eq!(
            parse_move("3,4,1"),
            Some(Move::Wall(Placement::vertical(3, 4)))
        );
        assert_eq!(
            parse_move(" 0, 7, 0 "),
            Some(Move::Wall(Placement::horizontal(0, 7)))
        );
    }

    #[test]
    fn test_parse_pawn_moves() {
        assert_eq!(parse_move("4,1"), Some(Move::Step((4, 1))));
        assert_eq!(parse_move("4,5;4,6"), Some(Move::Jump((4, 5), (4, 6))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for text in ["", "hello", "1,2,3,4", "8,0,0", "0,0,2", "9,0", "1;2", "1,2;3", "-1,0", "1,,2"] {
            assert_eq!(parse_move(text), None, "{text:?} should not parse");
        }
    }

    #[test]
    fn test_display_matches_parse() {
        for text in ["2,5,0", "7,7,1", "0,8", "3,3;3,4"] {
            let mv = parse_move(text).unwrap();
            assert_eq!(mv.to_string(), text);
        }
    }

    #[test]
    fn test_overlaps() {
        let h: PlacementSet = Placement::horizontal(3, 3).overlaps().collect();
        assert_eq!(h.len(), 4);
        assert!(h.contains(Placement::horizontal(2, 3)));
        assert!(h.contains(Placement::horizontal(4, 3)));
        assert!(h.contains(Placement::vertical(3, 3)));

        let corner: PlacementSet = Placement::vertical(0, 0).overlaps().collect();
        assert_eq!(corner.len(), 3);
        assert!(corner.contains(Placement::vertical(0, 1)));
        assert!(corner.contains(Placement::horizontal(0, 0)));
    }

    #[test]
    fn test_edge_cutters() {
        let north: Vec<_> = edge_cutters((4, 0), (4, 1)).collect();
        assert_eq!(north.len(), 2);
        assert!(north.contains(&Placement::horizontal(4, 0)));
        assert!(north.contains(&Placement::horizontal(3, 0)));

        // Direction of travel doesn't matter.
        let south: PlacementSet = edge_cutters((4, 1), (4, 0)).collect();
        assert_eq!(south, north.iter().copied().collect::<PlacementSet>());

        let east_edge: Vec<_> = edge_cutters((8, 0), (7, 0)).collect();
        assert_eq!(east_edge, vec![Placement::vertical(7, 0)]);

        let corner_column: Vec<_> = edge_cutters((8, 3), (8, 4)).collect();
        assert_eq!(corner_column, vec![Placement::horizontal(7, 3)]);
    }

    #[test]
    fn test_blockers_of_straight_path() {
        let path: Vec<Position> = (0..9).map(|y| (4, y)).collect();
        let blockers = blockers_of(&path);
        assert_eq!(blockers.len(), 16);
        assert!(blockers.iter().all(|p| p.orientation == Orientation::Horizontal));
    }

    #[test]
    fn test_set_ops() {
        let mut set = PlacementSet::EMPTY;
        assert!(set.insert(Placement::vertical(1, 1)));
        assert!(!set.insert(Placement::vertical(1, 1)));
        assert!(set.contains(Placement::vertical(1, 1)));
        assert_eq!(set.nth(0), Some(Placement::vertical(1, 1)));
        assert!(set.remove(Placement::vertical(1, 1)));
        assert!(set.is_empty());
    }
}
