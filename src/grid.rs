//! Occupancy grid and placement rules.
//!
//! The grid is a derived structure: it is never persisted, and it is rebuilt
//! wholesale from a room's item list on load and after every edit, so it can
//! never be partially stale.

use crate::types::{Cell, Item};

// ---------------------------------------------------------------------------
// OccupancyGrid
// ---------------------------------------------------------------------------

/// Boolean walkability grid, walkable by default, origin `(0,0)` top-left.
///
/// `Clone` yields a deep copy; pathfinding clones the live grid so an
/// in-flight search never observes a concurrent edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    blocked: Vec<bool>,
}

impl OccupancyGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            blocked: vec![false; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mark every cell walkable again.
    pub fn reset(&mut self) {
        self.blocked.fill(false);
    }

    pub fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    /// Block a single cell. Out-of-bounds coordinates are ignored so a
    /// footprint hanging off the edge cannot corrupt neighbouring rows.
    pub fn set_blocked(&mut self, x: u32, y: u32) {
        if let Some(i) = self.index_of(x, y) {
            self.blocked[i] = true;
        }
    }

    /// Out-of-bounds cells are reported as not walkable.
    pub fn is_walkable(&self, x: u32, y: u32) -> bool {
        match self.index_of(x, y) {
            Some(i) => !self.blocked[i],
            None => false,
        }
    }

    fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Item application
// ---------------------------------------------------------------------------

/// Reset the grid and block the rotated footprint of every item that is
/// neither walkable nor a wall. Pure function of the item list, therefore
/// idempotent.
pub fn apply_items(grid: &mut OccupancyGrid, items: &[Item]) {
    grid.reset();
    for item in items {
        if !item.blocks() {
            continue;
        }
        let origin = item.grid_position;
        let [width, height] = item.footprint();
        for dx in 0..width {
            for dy in 0..height {
                grid.set_blocked(origin.x + dx, origin.y + dy);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Placement validation
// ---------------------------------------------------------------------------

fn footprint_in_bounds(position: Cell, footprint: [u32; 2], grid_size: [u32; 2]) -> bool {
    // u64 arithmetic: wire positions are untrusted and may sit near u32::MAX.
    position.x as u64 + footprint[0] as u64 <= grid_size[0] as u64
        && position.y as u64 + footprint[1] as u64 <= grid_size[1] as u64
}

fn footprints_overlap(a_pos: Cell, a: [u32; 2], b_pos: Cell, b: [u32; 2]) -> bool {
    // Half-open intervals on both axes: touching edges do not overlap.
    (a_pos.x as u64) < b_pos.x as u64 + b[0] as u64
        && a_pos.x as u64 + a[0] as u64 > b_pos.x as u64
        && (a_pos.y as u64) < b_pos.y as u64 + b[1] as u64
        && a_pos.y as u64 + a[1] as u64 > b_pos.y as u64
}

/// Whether `candidate` may be dropped among `others` on a grid of
/// `grid_size` cells.
///
/// Bounds apply to every item; the overlap test only involves items that
/// block (walkable items and walls neither collide nor obstruct).
pub fn can_place<'a>(
    candidate: &Item,
    others: impl IntoIterator<Item = &'a Item>,
    grid_size: [u32; 2],
) -> bool {
    let footprint = candidate.footprint();
    if !footprint_in_bounds(candidate.grid_position, footprint, grid_size) {
        return false;
    }
    if !candidate.blocks() {
        return true;
    }
    others.into_iter().filter(|other| other.blocks()).all(|other| {
        !footprints_overlap(
            candidate.grid_position,
            footprint,
            other.grid_position,
            other.footprint(),
        )
    })
}

/// Validate a whole submitted layout. Returns the index of the first
/// offending item, if any.
pub fn validate_layout(items: &[Item], grid_size: [u32; 2]) -> Result<(), usize> {
    for (index, item) in items.iter().enumerate() {
        let others = items
            .iter()
            .enumerate()
            .filter(|(other_index, _)| *other_index != index)
            .map(|(_, other)| other);
        if !can_place(item, others, grid_size) {
            return Err(index);
        }
    }
    Ok(())
}
