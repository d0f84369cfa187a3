//! Grid pathfinding: A* with 8-directional movement and no corner cutting.
//!
//! The search consumes an owned [`OccupancyGrid`] snapshot — callers clone
//! the room's live grid under the coordinator lock, so an edit landing while
//! a search runs can never corrupt it.

use crate::error::RoomError;
use crate::grid::OccupancyGrid;
use crate::types::Cell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const STRAIGHT_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;

const DIRECTIONS: [(i64, i64); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Octile distance, admissible for 10/14 step costs.
fn heuristic(a: Cell, b: Cell) -> u32 {
    let dx = a.x.abs_diff(b.x);
    let dy = a.y.abs_diff(b.y);
    let diag = dx.min(dy);
    let straight = dx.max(dy) - diag;
    DIAGONAL_COST * diag + STRAIGHT_COST * straight
}

/// Find the ordered cell sequence from `start` to `end`, both inclusive.
///
/// A diagonal step is forbidden when either of its two adjacent orthogonal
/// cells is blocked. Failure (out-of-bounds or blocked endpoints, or no
/// connecting walkable route) leaves the caller free to treat the move as a
/// no-op.
pub fn find_path(grid: OccupancyGrid, start: Cell, end: Cell) -> Result<Vec<Cell>, RoomError> {
    if !grid.is_walkable(start.x, start.y) || !grid.is_walkable(end.x, end.y) {
        return Err(RoomError::NoPath(start, end));
    }
    if start == end {
        return Ok(vec![start]);
    }

    let width = grid.width() as usize;
    let node_count = width * grid.height() as usize;
    let index_of = |c: Cell| c.y as usize * width + c.x as usize;
    let cell_of = |i: usize| Cell::new((i % width) as u32, (i / width) as u32);

    let mut best_g = vec![u32::MAX; node_count];
    let mut closed = vec![false; node_count];
    let mut parent = vec![None::<usize>; node_count];

    // Reverse<(f, h, insertion)> keeps expansion order deterministic on ties.
    let mut open: BinaryHeap<Reverse<(u32, u32, u64, usize)>> = BinaryHeap::new();
    let mut insertion = 0u64;

    let start_index = index_of(start);
    best_g[start_index] = 0;
    let start_h = heuristic(start, end);
    open.push(Reverse((start_h, start_h, insertion, start_index)));

    while let Some(Reverse((_, _, _, current_index))) = open.pop() {
        if closed[current_index] {
            continue;
        }
        closed[current_index] = true;

        let current = cell_of(current_index);
        if current == end {
            return Ok(reconstruct(&parent, start_index, current_index, cell_of));
        }

        let current_g = best_g[current_index];
        for (dx, dy) in DIRECTIONS {
            let nx = current.x as i64 + dx;
            let ny = current.y as i64 + dy;
            if nx < 0 || ny < 0 {
                continue;
            }
            let neighbor = Cell::new(nx as u32, ny as u32);
            if !grid.is_walkable(neighbor.x, neighbor.y) {
                continue;
            }
            let diagonal = dx != 0 && dy != 0;
            if diagonal
                && !(grid.is_walkable(neighbor.x, current.y)
                    && grid.is_walkable(current.x, neighbor.y))
            {
                continue;
            }

            let neighbor_index = index_of(neighbor);
            if closed[neighbor_index] {
                continue;
            }
            let step = if diagonal { DIAGONAL_COST } else { STRAIGHT_COST };
            let tentative_g = current_g.saturating_add(step);
            if tentative_g >= best_g[neighbor_index] {
                continue;
            }

            best_g[neighbor_index] = tentative_g;
            parent[neighbor_index] = Some(current_index);
            let h = heuristic(neighbor, end);
            insertion += 1;
            open.push(Reverse((tentative_g + h, h, insertion, neighbor_index)));
        }
    }

    Err(RoomError::NoPath(start, end))
}

fn reconstruct(
    parent: &[Option<usize>],
    start_index: usize,
    goal_index: usize,
    cell_of: impl Fn(usize) -> Cell,
) -> Vec<Cell> {
    let mut indices = vec![goal_index];
    let mut cursor = goal_index;
    while cursor != start_index {
        // Every node on the path got a parent before being expanded.
        match parent[cursor] {
            Some(previous) => cursor = previous,
            None => break,
        }
        indices.push(cursor);
    }
    indices.reverse();
    indices.into_iter().map(cell_of).collect()
}
