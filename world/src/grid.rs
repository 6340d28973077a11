//! Square cell grid used for pathfinding and line-of-sight queries.

use std::collections::{BTreeSet, HashMap};

use gridbots_core::GridRef;
use tracing::debug;

use crate::priority_queue::PriorityQueue;

const DIRECTIONS: [GridRef; 8] = [
    GridRef::new(1, 0),
    GridRef::new(0, 1),
    GridRef::new(-1, 0),
    GridRef::new(0, -1),
    GridRef::new(1, 1),
    GridRef::new(-1, 1),
    GridRef::new(-1, -1),
    GridRef::new(1, -1),
];

/// Zero-indexed square grid of cells.
///
/// Valid cells satisfy `0 <= x < size` and `0 <= y < size`. Passing any other
/// cell to a grid query is a programming error and panics; an unreachable goal
/// is an ordinary outcome reported as `None` by [`Grid::route`].
///
/// Blocking cells are tracked in two independent sets so that an obstacle may
/// block sight without blocking movement, or the reverse. Cells are only ever
/// added to these sets.
#[derive(Clone, Debug)]
pub struct Grid {
    size: u32,
    movement_blocking_cells: BTreeSet<GridRef>,
    vision_blocking_cells: BTreeSet<GridRef>,
}

impl Grid {
    /// Creates an unobstructed grid with `size` cells per side.
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self {
            size,
            movement_blocking_cells: BTreeSet::new(),
            vision_blocking_cells: BTreeSet::new(),
        }
    }

    /// Number of cells along each side.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Every valid cell, computed on demand.
    #[must_use]
    pub fn cells(&self) -> BTreeSet<GridRef> {
        let size = self.side();
        (0..size)
            .flat_map(|x| (0..size).map(move |y| GridRef::new(x, y)))
            .collect()
    }

    /// Reports whether `cell` lies within the grid.
    #[must_use]
    pub fn contains(&self, cell: GridRef) -> bool {
        let size = self.side();
        (0..size).contains(&cell.x()) && (0..size).contains(&cell.y())
    }

    /// Cells that agents cannot move through.
    #[must_use]
    pub fn movement_blocking_cells(&self) -> &BTreeSet<GridRef> {
        &self.movement_blocking_cells
    }

    /// Cells that obstruct line of sight.
    #[must_use]
    pub fn vision_blocking_cells(&self) -> &BTreeSet<GridRef> {
        &self.vision_blocking_cells
    }

    /// Reports whether `cell` blocks movement.
    #[must_use]
    pub fn is_movement_blocking(&self, cell: GridRef) -> bool {
        self.movement_blocking_cells.contains(&cell)
    }

    pub(crate) fn block_movement(&mut self, cells: impl IntoIterator<Item = GridRef>) {
        for cell in cells {
            self.assert_in_bounds(cell);
            let _ = self.movement_blocking_cells.insert(cell);
        }
    }

    pub(crate) fn block_vision(&mut self, cells: impl IntoIterator<Item = GridRef>) {
        for cell in cells {
            self.assert_in_bounds(cell);
            let _ = self.vision_blocking_cells.insert(cell);
        }
    }

    /// In-bounds, non-blocking neighbours among the eight surrounding cells.
    ///
    /// A movement-blocking cell has no reachable neighbours.
    #[must_use]
    pub fn reachable_neighbours(&self, cell: GridRef) -> Vec<GridRef> {
        self.assert_in_bounds(cell);
        if self.is_movement_blocking(cell) {
            return Vec::new();
        }

        DIRECTIONS
            .iter()
            .map(|&direction| cell + direction)
            .filter(|&neighbour| self.contains(neighbour) && !self.is_movement_blocking(neighbour))
            .collect()
    }

    /// Euclidean distance between two cells.
    ///
    /// Adjacent cells cost `1` for cardinal moves and `√2` for diagonal moves.
    #[must_use]
    pub fn cost(from: GridRef, to: GridRef) -> f32 {
        let delta = to - from;
        (delta.x() as f32).hypot(delta.y() as f32)
    }

    /// Total Euclidean length of a cell path.
    #[must_use]
    pub fn path_cost(path: &[GridRef]) -> f32 {
        path.windows(2).map(|pair| Self::cost(pair[0], pair[1])).sum()
    }

    /// Cells crossed by the straight line between two cells, ends included.
    ///
    /// The line is sampled at `max(|dx|, |dy|) + 1` evenly spaced points and
    /// each sample is rounded to the nearest cell.
    #[must_use]
    pub fn cells_on_line(&self, start: GridRef, end: GridRef) -> Vec<GridRef> {
        self.assert_in_bounds(start);
        self.assert_in_bounds(end);
        if start == end {
            return vec![start];
        }

        let delta = end - start;
        let steps = delta.x().abs().max(delta.y().abs());
        let mut cells = Vec::with_capacity(usize::try_from(steps).unwrap_or(0) + 1);
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let cell = GridRef::new(
                lerp(start.x(), end.x(), t).round() as i32,
                lerp(start.y(), end.y(), t).round() as i32,
            );
            if cells.last() != Some(&cell) {
                cells.push(cell);
            }
        }
        cells
    }

    /// Reports whether an agent can move in a straight line between two cells.
    #[must_use]
    pub fn has_line_of_movement(&self, start: GridRef, end: GridRef) -> bool {
        self.cells_on_line(start, end)
            .iter()
            .all(|cell| !self.movement_blocking_cells.contains(cell))
    }

    /// Reports whether the line between two cells is free of vision-blocking cells.
    #[must_use]
    pub fn has_line_of_sight(&self, start: GridRef, end: GridRef) -> bool {
        self.cells_on_line(start, end)
            .iter()
            .all(|cell| !self.vision_blocking_cells.contains(cell))
    }

    /// Plans a cell route between two cells.
    ///
    /// Returns `None` when either end is movement-blocking or the goal cannot
    /// be reached. Otherwise the route starts at `from_cell` (unless both cells
    /// coincide, in which case it is just `[to_cell]`), ends at `to_cell`, and
    /// every consecutive pair of cells has a clear line of movement.
    #[must_use]
    pub fn route(&self, from_cell: GridRef, to_cell: GridRef) -> Option<Vec<GridRef>> {
        self.assert_in_bounds(from_cell);
        self.assert_in_bounds(to_cell);

        if self.is_movement_blocking(from_cell) || self.is_movement_blocking(to_cell) {
            return None;
        }
        if from_cell == to_cell {
            return Some(vec![to_cell]);
        }
        if self.has_line_of_movement(from_cell, to_cell) {
            return Some(vec![from_cell, to_cell]);
        }

        let came_from = self.uniform_cost_search(from_cell, to_cell);

        let mut path = vec![to_cell];
        let mut current = to_cell;
        while current != from_cell {
            let Some(previous) = came_from.get(&current).copied().flatten() else {
                debug!(?from_cell, ?to_cell, "no cell route found");
                return None;
            };
            path.push(previous);
            current = previous;
        }
        path.reverse();

        Some(self.simplify_path(path))
    }

    fn uniform_cost_search(
        &self,
        start: GridRef,
        goal: GridRef,
    ) -> HashMap<GridRef, Option<GridRef>> {
        let mut came_from = HashMap::from([(start, None)]);
        let mut cost_so_far = HashMap::from([(start, 0.0_f32)]);
        let mut frontier = PriorityQueue::default();
        frontier.put(0.0, start);

        while !frontier.is_empty() {
            let Some(current) = frontier.get() else {
                break;
            };
            if current == goal {
                break;
            }

            let Some(&current_cost) = cost_so_far.get(&current) else {
                continue;
            };
            for next in self.reachable_neighbours(current) {
                let new_cost = current_cost + Self::cost(current, next);
                let improved = cost_so_far
                    .get(&next)
                    .map_or(true, |&known| new_cost < known);
                if improved {
                    let _ = cost_so_far.insert(next, new_cost);
                    let _ = came_from.insert(next, Some(current));
                    frontier.put(new_cost, next);
                }
            }
        }

        came_from
    }

    fn simplify_path(&self, path: Vec<GridRef>) -> Vec<GridRef> {
        let raw_len = path.len();
        let path = remove_collinear_nodes(path);
        let mut pulled = self.string_pull(&path);
        pulled.reverse();
        let mut pulled = self.string_pull(&pulled);
        pulled.reverse();
        debug!(raw = raw_len, simplified = pulled.len(), "simplified cell path");
        pulled
    }

    /// Greedily skips to the farthest node with a clear line of movement.
    fn string_pull(&self, path: &[GridRef]) -> Vec<GridRef> {
        if path.len() <= 2 {
            return path.to_vec();
        }

        let mut pulled = vec![path[0]];
        let mut anchor = 0;
        while anchor < path.len() - 1 {
            let reach = (anchor + 2..path.len())
                .rev()
                .find(|&candidate| self.has_line_of_movement(path[anchor], path[candidate]))
                .unwrap_or(anchor + 1);
            pulled.push(path[reach]);
            anchor = reach;
        }
        pulled
    }

    fn side(&self) -> i32 {
        i32::try_from(self.size).unwrap_or(i32::MAX)
    }

    fn assert_in_bounds(&self, cell: GridRef) {
        assert!(
            self.contains(cell),
            "cell ({}, {}) is outside a grid of size {}",
            cell.x(),
            cell.y(),
            self.size
        );
    }
}

fn lerp(from: i32, to: i32, t: f32) -> f32 {
    from as f32 + (to - from) as f32 * t
}

fn remove_collinear_nodes(path: Vec<GridRef>) -> Vec<GridRef> {
    if path.len() < 3 {
        return path;
    }

    let mut culled: Vec<GridRef> = Vec::with_capacity(path.len());
    for node in path {
        let len = culled.len();
        if len >= 2 && continues_straight(culled[len - 2], culled[len - 1], node) {
            let _ = culled.pop();
        }
        culled.push(node);
    }
    culled
}

fn continues_straight(first: GridRef, middle: GridRef, last: GridRef) -> bool {
    let incoming = middle - first;
    let outgoing = last - middle;
    let cross = incoming.x() * outgoing.y() - incoming.y() * outgoing.x();
    let dot = incoming.x() * outgoing.x() + incoming.y() * outgoing.y();
    cross == 0 && dot > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with_blocks(size: u32, blocks: &[(i32, i32)]) -> Grid {
        let mut grid = Grid::new(size);
        grid.block_movement(blocks.iter().map(|&(x, y)| GridRef::new(x, y)));
        grid
    }

    fn assert_route_is_walkable(grid: &Grid, route: &[GridRef]) {
        for pair in route.windows(2) {
            assert!(
                grid.has_line_of_movement(pair[0], pair[1]),
                "segment {:?} -> {:?} crosses a blocking cell",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn cells_enumerates_every_cell() {
        let grid = Grid::new(2);
        let expected: BTreeSet<GridRef> = [(0, 0), (0, 1), (1, 0), (1, 1)]
            .into_iter()
            .map(|(x, y)| GridRef::new(x, y))
            .collect();
        assert_eq!(grid.cells(), expected);
        assert_eq!(Grid::new(7).cells().len(), 49);
    }

    #[test]
    fn cells_on_line_includes_both_ends() {
        let grid = Grid::new(4);
        let cells = grid.cells_on_line(GridRef::new(0, 0), GridRef::new(2, 3));
        assert_eq!(
            cells,
            vec![
                GridRef::new(0, 0),
                GridRef::new(1, 1),
                GridRef::new(1, 2),
                GridRef::new(2, 3),
            ]
        );
    }

    #[test]
    fn cells_on_line_for_single_cell() {
        let grid = Grid::new(3);
        let cell = GridRef::new(1, 2);
        assert_eq!(grid.cells_on_line(cell, cell), vec![cell]);
    }

    #[test]
    fn neighbours_exclude_out_of_bounds_and_blocked_cells() {
        let grid = grid_with_blocks(3, &[(1, 0)]);
        let neighbours = grid.reachable_neighbours(GridRef::new(0, 0));
        assert_eq!(neighbours.len(), 2);
        assert!(neighbours.contains(&GridRef::new(0, 1)));
        assert!(neighbours.contains(&GridRef::new(1, 1)));

        let centre = grid.reachable_neighbours(GridRef::new(1, 1));
        assert_eq!(centre.len(), 7);
    }

    #[test]
    fn blocked_cell_has_no_neighbours() {
        let grid = grid_with_blocks(3, &[(1, 1)]);
        assert!(grid.reachable_neighbours(GridRef::new(1, 1)).is_empty());
    }

    #[test]
    fn cost_is_euclidean() {
        let origin = GridRef::new(0, 0);
        assert_eq!(Grid::cost(origin, GridRef::new(1, 0)), 1.0);
        assert!((Grid::cost(origin, GridRef::new(1, 1)) - 2.0_f32.sqrt()).abs() < 1e-6);
        assert!((Grid::cost(origin, GridRef::new(3, 4)) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn route_to_same_cell_is_the_cell() {
        let grid = Grid::new(3);
        let cell = GridRef::new(2, 2);
        assert_eq!(grid.route(cell, cell), Some(vec![cell]));
    }

    #[test]
    fn direct_route_when_line_is_clear() {
        let grid = grid_with_blocks(64, &[(10, 40), (50, 3)]);
        let from = GridRef::new(0, 0);
        let to = GridRef::new(63, 31);
        assert_eq!(grid.route(from, to), Some(vec![from, to]));
    }

    #[test]
    fn no_route_to_blocked_goal() {
        let grid = grid_with_blocks(4, &[(3, 3)]);
        assert_eq!(grid.route(GridRef::new(0, 0), GridRef::new(3, 3)), None);
    }

    #[test]
    fn no_route_from_blocked_start() {
        let grid = grid_with_blocks(4, &[(0, 0)]);
        assert_eq!(grid.route(GridRef::new(0, 0), GridRef::new(3, 3)), None);
    }

    #[test]
    fn no_route_into_enclosed_cell() {
        let grid = grid_with_blocks(
            5,
            &[
                (1, 1),
                (2, 1),
                (3, 1),
                (1, 2),
                (3, 2),
                (1, 3),
                (2, 3),
                (3, 3),
            ],
        );
        assert_eq!(grid.route(GridRef::new(0, 0), GridRef::new(2, 2)), None);
    }

    #[test]
    fn route_detours_around_single_block() {
        let grid = grid_with_blocks(4, &[(2, 1)]);
        let from = GridRef::new(0, 0);
        let to = GridRef::new(3, 1);

        let route = grid.route(from, to).expect("route exists");

        assert_eq!(route.first(), Some(&from));
        assert_eq!(route.last(), Some(&to));
        assert!(route.len() > 2, "line is obstructed, so a detour is required");
        assert!(!route.contains(&GridRef::new(2, 1)));
        assert_route_is_walkable(&grid, &route);

        let optimal = 2.0 + 2.0_f32.sqrt();
        let cost = Grid::path_cost(&route);
        assert!(cost <= optimal + 1e-4, "route cost {cost} exceeds {optimal}");
        assert!(cost >= Grid::cost(from, to));
    }

    #[test]
    fn route_through_wall_gap_is_simplified() {
        // Vertical wall at x = 4 with a single gap at y = 8.
        let wall: Vec<(i32, i32)> = (0..10).filter(|&y| y != 8).map(|y| (4, y)).collect();
        let grid = grid_with_blocks(10, &wall);
        let from = GridRef::new(0, 0);
        let to = GridRef::new(9, 0);

        let route = grid.route(from, to).expect("gap is passable");

        assert_eq!(route.first(), Some(&from));
        assert_eq!(route.last(), Some(&to));
        assert!(route.len() <= 5, "expected a handful of waypoints, got {route:?}");
        assert!(route.iter().any(|cell| cell.y() >= 7));
        assert_route_is_walkable(&grid, &route);
    }

    #[test]
    fn collinear_nodes_are_removed() {
        let path: Vec<GridRef> = (0..5).map(|x| GridRef::new(x, 0)).collect();
        assert_eq!(
            remove_collinear_nodes(path),
            vec![GridRef::new(0, 0), GridRef::new(4, 0)]
        );

        let bend = vec![
            GridRef::new(0, 0),
            GridRef::new(1, 1),
            GridRef::new(2, 2),
            GridRef::new(3, 2),
            GridRef::new(4, 2),
        ];
        assert_eq!(
            remove_collinear_nodes(bend),
            vec![GridRef::new(0, 0), GridRef::new(2, 2), GridRef::new(4, 2)]
        );
    }

    #[test]
    fn line_of_sight_ignores_movement_only_blocks() {
        let mut grid = grid_with_blocks(5, &[(2, 2)]);
        let from = GridRef::new(0, 0);
        let to = GridRef::new(4, 4);
        assert!(grid.has_line_of_sight(from, to));
        assert!(!grid.has_line_of_movement(from, to));

        grid.block_vision([GridRef::new(2, 2)]);
        assert!(!grid.has_line_of_sight(from, to));
    }

    #[test]
    #[should_panic(expected = "outside a grid")]
    fn out_of_bounds_cell_panics() {
        let grid = Grid::new(4);
        let _ = grid.route(GridRef::new(0, 0), GridRef::new(4, 0));
    }
}
