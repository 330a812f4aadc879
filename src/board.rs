//! Cell grid with wall flags, pawn occupancy, and connectivity searches.
//!
//! Every cell carries a byte of flags (see [`crate::constants`]). A wall sets
//! the facing flags on both sides of each edge it blocks, and the board edge
//! is a permanent ring of blocking flags, so neighbour queries never need a
//! bounds check beyond the flags themselves.
//!
//! Walls also live on a lattice of 10x10 corners. Corner `(i, j)` is the
//! lower-left corner of cell `(i, j)`; a segment joins two adjacent corners
//! whenever the cell edge between them is blocked. The legality engine uses
//! this lattice to find which placements could possibly close a region.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;

use crate::constants::{
    CORNERS, ILLEGAL_H, ILLEGAL_V, LATTICE, N, PAWN, WALL_E, WALL_N, WALL_S, WALL_W,
};
use crate::moves::{Orientation, Placement, Position};

/// Lattice corner `(i, j)`, both in `0..10`.
pub type Corner = (usize, usize);

#[inline]
fn manhattan(a: Position, b: Position) -> usize {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardGrid {
    cells: [[u8; N]; N],
}

impl Default for BoardGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardGrid {
    /// Empty board: only the outer ring of edge flags is set.
    pub fn new() -> Self {
        let mut cells = [[0u8; N]; N];
        for i in 0..N {
            cells[0][i] |= WALL_W;
            cells[N - 1][i] |= WALL_E;
            cells[i][0] |= WALL_S;
            cells[i][N - 1] |= WALL_N;
        }
        Self { cells }
    }

    #[inline]
    pub fn cell(&self, (x, y): Position) -> u8 {
        self.cells[x][y]
    }

    #[inline]
    fn cell_mut(&mut self, (x, y): Position) -> &mut u8 {
        &mut self.cells[x][y]
    }

    /// Flags set by a placement, paired with the cells they go on.
    fn wall_flags(p: Placement) -> [(Position, u8); 4] {
        let (x, y) = (p.x, p.y);
        match p.orientation {
            Orientation::Horizontal => [
                ((x, y), WALL_N),
                ((x + 1, y), WALL_N),
                ((x, y + 1), WALL_S),
                ((x + 1, y + 1), WALL_S),
            ],
            Orientation::Vertical => [
                ((x, y), WALL_E),
                ((x, y + 1), WALL_E),
                ((x + 1, y), WALL_W),
                ((x + 1, y + 1), WALL_W),
            ],
        }
    }

    pub fn add_wall(&mut self, p: Placement) {
        for (pos, flag) in Self::wall_flags(p) {
            *self.cell_mut(pos) |= flag;
        }
    }

    pub fn remove_wall(&mut self, p: Placement) {
        for (pos, flag) in Self::wall_flags(p) {
            *self.cell_mut(pos) &= !flag;
        }
    }

    pub fn add_pawn(&mut self, pos: Position) {
        *self.cell_mut(pos) |= PAWN;
    }

    pub fn remove_pawn(&mut self, pos: Position) {
        *self.cell_mut(pos) &= !PAWN;
    }

    #[inline]
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.cell(pos) & PAWN != 0
    }

    #[inline]
    fn illegal_flag(p: Placement) -> u8 {
        match p.orientation {
            Orientation::Horizontal => ILLEGAL_H,
            Orientation::Vertical => ILLEGAL_V,
        }
    }

    #[inline]
    pub fn is_illegal(&self, p: Placement) -> bool {
        self.cells[p.x][p.y] & Self::illegal_flag(p) != 0
    }

    pub fn mark_illegal(&mut self, p: Placement) {
        self.cells[p.x][p.y] |= Self::illegal_flag(p);
    }

    pub fn unmark_illegal(&mut self, p: Placement) {
        self.cells[p.x][p.y] &= !Self::illegal_flag(p);
    }

    /// Reachable orthogonal neighbours, in N, E, S, W order.
    pub fn neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + use<> {
        let (x, y) = pos;
        let c = self.cell(pos);
        [
            (c & WALL_N == 0).then(|| (x, y + 1)),
            (c & WALL_E == 0).then(|| (x + 1, y)),
            (c & WALL_S == 0).then(|| (x, y.wrapping_sub(1))),
            (c & WALL_W == 0).then(|| (x.wrapping_sub(1), y)),
        ]
        .into_iter()
        .flatten()
    }

    #[inline]
    pub fn is_adjacent_open(&self, from: Position, to: Position) -> bool {
        self.neighbors(from).any(|n| n == to)
    }

    // =========================================================================
    // Corner lattice
    // =========================================================================

    /// Segment from corner `(i, j)` to `(i + 1, j)`.
    fn segment_h(&self, (i, j): Corner) -> bool {
        (j < N && self.cells[i][j] & WALL_S != 0) || (j > 0 && self.cells[i][j - 1] & WALL_N != 0)
    }

    /// Segment from corner `(i, j)` to `(i, j + 1)`.
    fn segment_v(&self, (i, j): Corner) -> bool {
        (i < N && self.cells[i][j] & WALL_W != 0) || (i > 0 && self.cells[i - 1][j] & WALL_E != 0)
    }

    /// Corners joined to `c` by a wall segment.
    fn linked_corners(&self, c: Corner) -> impl Iterator<Item = Corner> + use<> {
        let (i, j) = c;
        [
            (i < N && self.segment_h(c)).then(|| (i + 1, j)),
            (i > 0 && self.segment_h((i - 1, j))).then(|| (i - 1, j)),
            (j < N && self.segment_v(c)).then(|| (i, j + 1)),
            (j > 0 && self.segment_v((i, j - 1))).then(|| (i, j - 1)),
        ]
        .into_iter()
        .flatten()
    }

    fn has_segment(&self, c: Corner) -> bool {
        self.linked_corners(c).next().is_some()
    }

    /// The three corners a placement spans: one end, the centre, the other end.
    pub fn anchors(p: Placement) -> [Corner; 3] {
        let (x, y) = (p.x, p.y);
        match p.orientation {
            Orientation::Horizontal => [(x, y + 1), (x + 1, y + 1), (x + 2, y + 1)],
            Orientation::Vertical => [(x + 1, y), (x + 1, y + 1), (x + 1, y + 2)],
        }
    }

    /// Which anchors already carry a wall segment.
    pub fn touching_anchors(&self, p: Placement) -> [bool; 3] {
        Self::anchors(p).map(|c| self.has_segment(c))
    }

    /// Number of anchors already carrying a wall segment, board edge included.
    ///
    /// A placement with no touches cannot close a region. It needs at least
    /// two anchors in one connected wall structure before it can cut anyone.
    pub fn touches(&self, p: Placement) -> usize {
        self.touching_anchors(p).into_iter().filter(|&t| t).count()
    }

    /// Placements that have `corner` among their anchors.
    pub fn placements_anchored_at(corner: Corner) -> impl Iterator<Item = Placement> {
        let (i, j) = (corner.0 as isize, corner.1 as isize);
        let lattice = LATTICE as isize;
        let in_range = move |x: isize, y: isize| (0..lattice).contains(&x) && (0..lattice).contains(&y);
        let horizontal = (i - 2..=i)
            .filter(move |&x| in_range(x, j - 1))
            .map(move |x| Placement::horizontal(x as usize, (j - 1) as usize));
        let vertical = (j - 2..=j)
            .filter(move |&y| in_range(i - 1, y))
            .map(move |y| Placement::vertical((i - 1) as usize, y as usize));
        horizontal.chain(vertical)
    }

    /// Every corner linked to the placement's anchors through wall segments.
    pub fn wall_structure(&self, p: Placement) -> CornerSet {
        let mut seen = CornerSet::default();
        let mut queue: VecDeque<Corner> = VecDeque::new();
        for c in Self::anchors(p) {
            if seen.insert(c) {
                queue.push_back(c);
            }
        }
        while let Some(c) = queue.pop_front() {
            for next in self.linked_corners(c) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    // =========================================================================
    // Connectivity
    // =========================================================================

    /// Whether `pos` can reach any cell in `goals`, ignoring pawns.
    ///
    /// Best-first from the goal side with Manhattan distance to `pos` as the
    /// priority. Finds some route, not the shortest one.
    pub fn are_connected_greedy(&self, pos: Position, goals: &[Position]) -> bool {
        let mut visited = [[false; N]; N];
        let mut frontier = BinaryHeap::new();
        for &g in goals {
            if !visited[g.0][g.1] {
                visited[g.0][g.1] = true;
                frontier.push(Reverse((manhattan(g, pos), g)));
            }
        }
        while let Some(Reverse((_, cur))) = frontier.pop() {
            if cur == pos {
                return true;
            }
            for next in self.neighbors(cur) {
                if !visited[next.0][next.1] {
                    visited[next.0][next.1] = true;
                    frontier.push(Reverse((manhattan(next, pos), next)));
                }
            }
        }
        false
    }

    /// A* from the goal side towards `start`. Returns the distance and the
    /// parent map, where each cell's parent is one step closer to a goal.
    fn astar(&self, start: Position, goals: &[Position]) -> Option<(usize, [[Option<Position>; N]; N])> {
        let mut best = [[usize::MAX; N]; N];
        let mut parent = [[None; N]; N];
        let mut open = BinaryHeap::new();
        for &g in goals {
            best[g.0][g.1] = 0;
            open.push(Reverse((manhattan(g, start), 0usize, g)));
        }
        while let Some(Reverse((_, cost, cur))) = open.pop() {
            if cost > best[cur.0][cur.1] {
                continue;
            }
            if cur == start {
                return Some((cost, parent));
            }
            for next in self.neighbors(cur) {
                let next_cost = cost + 1;
                if next_cost < best[next.0][next.1] {
                    best[next.0][next.1] = next_cost;
                    parent[next.0][next.1] = Some(cur);
                    open.push(Reverse((next_cost + manhattan(next, start), next_cost, next)));
                }
            }
        }
        None
    }

    /// Shortest path from `start` to the nearest goal, both ends included.
    pub fn astar_full_path(&self, start: Position, goals: &[Position]) -> Option<Vec<Position>> {
        let (cost, parent) = self.astar(start, goals)?;
        let mut path = Vec::with_capacity(cost + 1);
        let mut cur = Some(start);
        while let Some(pos) = cur {
            path.push(pos);
            cur = parent[pos.0][pos.1];
        }
        Some(path)
    }

    pub fn astar_distance(&self, start: Position, goals: &[Position]) -> Option<usize> {
        self.astar(start, goals).map(|(cost, _)| cost)
    }

    /// Draw the grid, asking `label` for the glyph of each cell.
    pub fn render(&self, label: impl Fn(Position) -> Option<char>) -> String {
        let mut out = String::new();
        for y in (0..N).rev() {
            out.push_str(&format!("{y} "));
            for x in 0..N {
                out.push(label((x, y)).unwrap_or('.'));
                if x + 1 < N {
                    out.push(if self.cells[x][y] & WALL_E != 0 { '|' } else { ' ' });
                }
            }
            out.push('\n');
            if y > 0 {
                out.push_str("  ");
                for x in 0..N {
                    out.push(if self.cells[x][y] & WALL_S != 0 { '-' } else { ' ' });
                    if x + 1 < N {
                        out.push(' ');
                    }
                }
                out.push('\n');
            }
        }
        out.push_str("  ");
        for x in 0..N {
            out.push_str(&format!("{x} "));
        }
        out.push('\n');
        out
    }
}

impl fmt::Display for BoardGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.render(|pos| self.is_occupied(pos).then_some('o'));
        f.write_str(&text)
    }
}

/// Set of lattice corners as a bitmask.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CornerSet(u128);

impl CornerSet {
    #[inline]
    fn bit((i, j): Corner) -> u128 {
        1u128 << (j * CORNERS + i)
    }

    pub fn insert(&mut self, c: Corner) -> bool {
        let fresh = self.0 & Self::bit(c) == 0;
        self.0 |= Self::bit(c);
        fresh
    }

    #[inline]
    pub fn contains(&self, c: Corner) -> bool {
        self.0 & Self::bit(c) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_board_edges() {
        let b = BoardGrid::new();
        assert_eq!(b.neighbors((0, 0)).collect::<Vec<_>>(), vec![(0, 1), (1, 0)]);
        assert_eq!(b.neighbors((4, 4)).count(), 4);
        assert_eq!(
            b.neighbors((8, 8)).collect::<Vec<_>>(),
            vec![(8, 7), (7, 8)]
        );
    }

    #[test]
    fn test_wall_blocks_both_sides() {
        let mut b = BoardGrid::new();
        b.add_wall(Placement::horizontal(3, 3));
        assert!(!b.is_adjacent_open((3, 3), (3, 4)));
        assert!(!b.is_adjacent_open((4, 4), (4, 3)));
        assert!(b.is_adjacent_open((5, 3), (5, 4)));

        b.add_wall(Placement::vertical(0, 0));
        assert!(!b.is_adjacent_open((0, 0), (1, 0)));
        assert!(!b.is_adjacent_open((1, 1), (0, 1)));
    }

    #[test]
    fn test_add_remove_is_identity() {
        let mut b = BoardGrid::new();
        b.add_wall(Placement::horizontal(0, 0));
        b.add_pawn((4, 4));
        let before = b.clone();
        for p in [Placement::vertical(4, 4), Placement::horizontal(2, 0), Placement::vertical(7, 7)] {
            b.add_wall(p);
            assert_ne!(b, before);
            b.remove_wall(p);
            assert_eq!(b, before);
        }
    }

    #[test]
    fn test_illegal_flags_are_per_orientation() {
        let mut b = BoardGrid::new();
        b.mark_illegal(Placement::vertical(2, 5));
        assert!(b.is_illegal(Placement::vertical(2, 5)));
        assert!(!b.is_illegal(Placement::horizontal(2, 5)));
        b.unmark_illegal(Placement::vertical(2, 5));
        assert_eq!(b, BoardGrid::new());
    }

    #[test]
    fn test_touches() {
        let mut b = BoardGrid::new();
        // Open interior: nothing nearby.
        assert_eq!(b.touches(Placement::horizontal(3, 3)), 0);
        // Left end sits on the west border.
        assert_eq!(b.touches(Placement::horizontal(0, 3)), 1);
        b.add_wall(Placement::horizontal(3, 3));
        // Continues the wall to the east, shares corner (5, 4).
        assert_eq!(b.touches(Placement::horizontal(5, 3)), 1);
        // Rising to the east end of the wall touches it with the top anchor only.
        assert_eq!(b.touching_anchors(Placement::vertical(4, 2)), [false, false, true]);
        // Spans the whole gap between wall and east border.
        b.add_wall(Placement::horizontal(5, 3));
        assert_eq!(b.touches(Placement::horizontal(7, 3)), 2);
    }

    #[test]
    fn test_placements_anchored_at() {
        let around: Vec<_> = BoardGrid::placements_anchored_at((4, 4)).collect();
        assert_eq!(around.len(), 6);
        for p in &around {
            assert!(BoardGrid::anchors(*p).contains(&(4, 4)));
        }
        // A border corner only has the two placements reaching it.
        let corner: Vec<_> = BoardGrid::placements_anchored_at((0, 1)).collect();
        assert_eq!(corner, vec![Placement::horizontal(0, 0)]);
    }

    #[test]
    fn test_wall_structure_reaches_border() {
        let mut b = BoardGrid::new();
        let p = Placement::horizontal(0, 4);
        b.add_wall(p);
        let structure = b.wall_structure(p);
        assert!(structure.contains((0, 0)));
        assert!(structure.contains((9, 9)));
        assert!(structure.contains((2, 5)));

        let floating = Placement::vertical(4, 4);
        b.add_wall(floating);
        let structure = b.wall_structure(floating);
        assert_eq!(structure.len(), 3);
        assert!(!structure.contains((0, 0)));
    }

    #[test]
    fn test_greedy_and_astar_agree_on_reachability() {
        let mut b = BoardGrid::new();
        let top: Vec<Position> = (0..N).map(|x| (x, N - 1)).collect();
        assert!(b.are_connected_greedy((4, 0), &top));
        assert_eq!(b.astar_distance((4, 0), &top), Some(8));

        // Wall off row 0 from row 1 except for the far east cell.
        for x in [0, 2, 4, 6] {
            b.add_wall(Placement::horizontal(x, 0));
        }
        assert!(b.are_connected_greedy((0, 0), &top));
        assert_eq!(b.astar_distance((0, 0), &top), Some(16));

        b.add_wall(Placement::vertical(7, 0));
        assert!(!b.are_connected_greedy((0, 0), &top));
        assert_eq!(b.astar_full_path((0, 0), &top), None);
    }

    #[test]
    fn test_astar_path_shape() {
        let mut b = BoardGrid::new();
        b.add_wall(Placement::horizontal(3, 0));
        let top: Vec<Position> = (0..N).map(|x| (x, N - 1)).collect();
        let path = b.astar_full_path((4, 0), &top).unwrap();
        assert_eq!(path.first(), Some(&(4, 0)));
        assert_eq!(path.last().map(|p| p.1), Some(N - 1));
        assert_eq!(path.len(), 10);
        for step in path.windows(2) {
            assert!(b.is_adjacent_open(step[0], step[1]));
        }
    }
}
