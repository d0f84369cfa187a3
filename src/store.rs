//! Room storage: the persisted room document, the live `Room` state it
//! hydrates into, and the single-writer persistence path.
//!
//! The on-disk document is an array of room definitions
//! `{id, name, password?, items}`. Room size and grid division are
//! process-wide constants re-applied at load, never persisted.

use crate::error::RoomError;
use crate::grid::{self, OccupancyGrid};
use crate::types::{Item, MapSnapshot, Participant, RoomSummary, GRID_DIVISION, ROOM_SIZE};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default room set compiled into the binary, used when the persisted
/// document is missing or unreadable.
const DEFAULT_ROOMS: &str = include_str!("../data/default_rooms.json");

// ---------------------------------------------------------------------------
// Persisted document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub items: Vec<Item>,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One live room: identity, item layout, derived occupancy grid, and the
/// participants currently inside.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub password: Option<String>,
    pub size: [u32; 2],
    pub grid_division: u32,
    pub items: Vec<Item>,
    pub grid: OccupancyGrid,
    pub participants: Vec<Participant>,
}

impl Room {
    fn from_definition(definition: RoomDefinition) -> Self {
        let grid_size = [ROOM_SIZE[0] * GRID_DIVISION, ROOM_SIZE[1] * GRID_DIVISION];
        let mut room = Self {
            id: definition.id,
            name: definition.name,
            password: definition.password,
            size: ROOM_SIZE,
            grid_division: GRID_DIVISION,
            items: definition.items,
            grid: OccupancyGrid::new(grid_size[0], grid_size[1]),
            participants: Vec::new(),
        };
        room.rebuild_occupancy();
        room
    }

    /// Grid extent in cells on each axis.
    pub fn grid_size(&self) -> [u32; 2] {
        [
            self.size[0] * self.grid_division,
            self.size[1] * self.grid_division,
        ]
    }

    /// Re-derive the occupancy grid from the item list. Idempotent.
    pub fn rebuild_occupancy(&mut self) {
        grid::apply_items(&mut self.grid, &self.items);
    }

    pub fn map_snapshot(&self) -> MapSnapshot {
        MapSnapshot {
            grid_division: self.grid_division,
            size: self.size,
            items: self.items.clone(),
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            nb_characters: self.participants.len(),
        }
    }

    pub fn participant(&self, id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: Uuid) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    pub fn remove_participant(&mut self, id: Uuid) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(index))
    }

    fn definition(&self) -> RoomDefinition {
        RoomDefinition {
            id: self.id.clone(),
            name: self.name.clone(),
            password: self.password.clone(),
            items: self.items.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomStore
// ---------------------------------------------------------------------------

/// Owns every room for the process lifetime. Rooms are created once at
/// startup; there is no runtime creation or deletion.
pub struct RoomStore {
    rooms: Vec<Room>,
    document_path: PathBuf,
    writer: Option<mpsc::UnboundedSender<String>>,
}

impl RoomStore {
    /// Load the persisted document at `document_path`, falling back to the
    /// bundled default set. Fails only when neither parses — the process
    /// must refuse to start in that case.
    pub fn load(document_path: impl Into<PathBuf>) -> Result<Self, RoomError> {
        let document_path = document_path.into();
        let definitions = match fs::read_to_string(&document_path) {
            Ok(text) => match serde_json::from_str::<Vec<RoomDefinition>>(&text) {
                Ok(defs) => defs,
                Err(e) => {
                    warn!(
                        "Persisted room document {} is corrupt ({}), using bundled defaults",
                        document_path.display(),
                        e
                    );
                    parse_default_rooms()?
                }
            },
            Err(e) => {
                info!(
                    "No room document at {} ({}), using bundled defaults",
                    document_path.display(),
                    e
                );
                parse_default_rooms()?
            }
        };

        let rooms: Vec<Room> = definitions.into_iter().map(Room::from_definition).collect();
        info!("Loaded {} room(s)", rooms.len());

        Ok(Self {
            rooms,
            document_path,
            writer: None,
        })
    }

    /// Construct from in-memory definitions (tests, tooling).
    pub fn from_definitions(
        definitions: Vec<RoomDefinition>,
        document_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rooms: definitions.into_iter().map(Room::from_definition).collect(),
            document_path: document_path.into(),
            writer: None,
        }
    }

    /// Route persistence through the given single-writer channel instead of
    /// writing synchronously.
    pub fn set_writer(&mut self, writer: mpsc::UnboundedSender<String>) {
        self.writer = Some(writer);
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn room_mut(&mut self, id: &str) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.id == id)
    }

    /// Room summaries in load order.
    pub fn list_summaries(&self) -> Vec<RoomSummary> {
        self.rooms.iter().map(Room::summary).collect()
    }

    /// Replace a room's item list wholesale, rebuild its occupancy grid, and
    /// persist the full room set.
    pub fn replace_items(&mut self, room_id: &str, items: Vec<Item>) -> Result<(), RoomError> {
        let room = self
            .room_mut(room_id)
            .ok_or_else(|| RoomError::UnknownRoom(room_id.to_string()))?;
        room.items = items;
        room.rebuild_occupancy();
        self.persist()
    }

    /// Serialize every room definition and hand it to the writer task, or
    /// write synchronously when no writer is attached.
    pub fn persist(&self) -> Result<(), RoomError> {
        let definitions: Vec<RoomDefinition> = self.rooms.iter().map(Room::definition).collect();
        let document = serde_json::to_string_pretty(&definitions)
            .map_err(|e| RoomError::Persist(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        match &self.writer {
            Some(tx) => {
                // The writer always flushes the newest queued snapshot, so a
                // full channel of stale documents is harmless.
                if tx.send(document).is_err() {
                    warn!("Persist writer is gone; room edits will not reach disk");
                }
                Ok(())
            }
            None => {
                write_text_atomic(&self.document_path, &document)?;
                Ok(())
            }
        }
    }
}

fn parse_default_rooms() -> Result<Vec<RoomDefinition>, RoomError> {
    serde_json::from_str(DEFAULT_ROOMS).map_err(|e| RoomError::NoPersistedRooms(e.to_string()))
}

// ---------------------------------------------------------------------------
// Persistence writer
// ---------------------------------------------------------------------------

/// Spawn the single-writer persistence task.
///
/// Documents are full snapshots, so the writer drains the queue and writes
/// only the newest one: last accepted edit wins, with at most one disk write
/// in flight per process.
pub fn spawn_persist_writer(document_path: PathBuf) -> mpsc::UnboundedSender<String> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(mut document) = rx.recv().await {
            while let Ok(newer) = rx.try_recv() {
                document = newer;
            }
            let path = document_path.clone();
            let result =
                tokio::task::spawn_blocking(move || write_text_atomic(&path, &document)).await;
            match result {
                Ok(Ok(())) => debug!("Room document persisted"),
                Ok(Err(e)) => warn!("Failed to persist room document: {}", e),
                Err(e) => warn!("Persist writer task panicked: {}", e),
            }
        }
    });
    tx
}

/// Copy-on-write document replacement: write a temp file next to the target,
/// then rename over it.
fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, text)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
