//! Core room types shared across all modules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Room width/height in world units, identical for every room.
pub const ROOM_SIZE: [u32; 2] = [70, 70];

/// Grid cells per world unit. A room's occupancy grid spans
/// `ROOM_SIZE * GRID_DIVISION` cells on each axis.
pub const GRID_DIVISION: u32 = 2;

// ---------------------------------------------------------------------------
// Grid coordinates
// ---------------------------------------------------------------------------

/// One discrete cell of a room's occupancy grid, origin at the top-left.
///
/// On the wire a cell is a two-element `[x, y]` array.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

impl Cell {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<[u32; 2]> for Cell {
    fn from(v: [u32; 2]) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

impl From<Cell> for [u32; 2] {
    fn from(c: Cell) -> Self {
        [c.x, c.y]
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A placed object: footprint in grid cells at rotation 0, anchored by its
/// top-left cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Catalog type identifier (asset name on the client).
    pub name: String,
    /// Footprint `[width, height]` in grid cells at rotation 0.
    pub size: [u32; 2],
    /// Top-left cell of the footprint.
    pub grid_position: Cell,
    /// Quarter turns, `0..=3`. Rotations 1 and 3 swap width and height.
    #[serde(default)]
    pub rotation: u8,
    /// Walkable items (floors) never block the grid or collide.
    #[serde(default)]
    pub walkable: bool,
    /// Walls block visually on the client but not for pathing or placement.
    #[serde(default)]
    pub wall: bool,
}

impl Item {
    /// Effective `[width, height]` with rotation applied.
    pub fn footprint(&self) -> [u32; 2] {
        if self.rotation % 2 == 1 {
            [self.size[1], self.size[0]]
        } else {
            self.size
        }
    }

    /// Whether this item occupies grid cells and collides with other items.
    pub fn blocks(&self) -> bool {
        !self.walkable && !self.wall
    }
}

/// A placeable item type as advertised in the `welcome` catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    pub name: String,
    pub size: [u32; 2],
}

/// The static catalog of placeable item types, keyed by short name.
pub fn item_catalog() -> BTreeMap<String, ItemSpec> {
    let specs = [
        ("carpaDescubierta", [7, 7]),
        ("jardinParque05", [6, 6]),
        ("jardinParque07", [18, 58]),
    ];
    specs
        .into_iter()
        .map(|(key, size)| {
            (
                key.to_string(),
                ItemSpec {
                    name: format!("item-{key}"),
                    size,
                },
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// Cosmetic attributes of a participant's avatar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hair_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom_color: Option<String>,
}

/// The live, connection-bound representation of a person in a room.
///
/// One per connection, one connection per participant, one room per
/// participant. The connection id doubles as display key on the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub position: Cell,
    /// Pending route; empty when the participant is standing still. The
    /// server never advances position along it — the renderer does.
    #[serde(default)]
    pub path: Vec<Cell>,
    #[serde(flatten)]
    pub appearance: Appearance,
    /// Granted after a successful password check. Never leaves the server.
    #[serde(skip)]
    pub can_edit_room: bool,
}

impl Participant {
    pub fn new(id: Uuid, position: Cell, appearance: Appearance) -> Self {
        Self {
            id,
            position,
            path: Vec::new(),
            appearance,
            can_edit_room: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived, broadcast-only views
// ---------------------------------------------------------------------------

/// Lightweight cross-room view of a room, for the lobby list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub nb_characters: usize,
}

/// The map portion of `roomJoined` / `mapUpdate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSnapshot {
    pub grid_division: u32,
    pub size: [u32; 2],
    pub items: Vec<Item>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_round_trips_as_array() {
        let cell = Cell::new(3, 9);
        let json = serde_json::to_string(&cell).unwrap();
        assert_eq!(json, "[3,9]");
        let back: Cell = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cell);
    }

    #[test]
    fn rotation_swaps_footprint() {
        let mut item = Item {
            name: "item-test".into(),
            size: [3, 2],
            grid_position: Cell::new(0, 0),
            rotation: 0,
            walkable: false,
            wall: false,
        };
        assert_eq!(item.footprint(), [3, 2]);
        item.rotation = 1;
        assert_eq!(item.footprint(), [2, 3]);
        item.rotation = 2;
        assert_eq!(item.footprint(), [3, 2]);
        item.rotation = 3;
        assert_eq!(item.footprint(), [2, 3]);
    }

    #[test]
    fn item_defaults_from_sparse_json() {
        let item: Item =
            serde_json::from_str(r#"{"name":"item-x","size":[4,4],"gridPosition":[1,2]}"#).unwrap();
        assert_eq!(item.rotation, 0);
        assert!(!item.walkable);
        assert!(!item.wall);
        assert!(item.blocks());
    }

    #[test]
    fn catalog_has_positive_footprints() {
        let catalog = item_catalog();
        assert!(!catalog.is_empty());
        for spec in catalog.values() {
            assert!(spec.size[0] > 0 && spec.size[1] > 0);
        }
    }
}
