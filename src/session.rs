//! Session tracking: which room each live connection has joined, and the
//! participant operations driven through it.
//!
//! Each connection gets an explicit [`Session`] record looked up by id on
//! every event — no per-connection captured state. The participant record
//! itself lives on the room, so the room's participant list is always the
//! authoritative roster.

use crate::error::RoomError;
use crate::grid::OccupancyGrid;
use crate::path::find_path;
use crate::store::RoomStore;
use crate::types::{Appearance, Cell, Participant};
use log::debug;
use rand::Rng;
use std::collections::HashMap;
use uuid::Uuid;

/// Upper bound on uniform spawn sampling attempts.
pub const SPAWN_ATTEMPTS: u32 = 100;

#[derive(Debug, Default)]
pub struct Session {
    /// Room the connection has joined, if any. At most one at a time.
    pub room_id: Option<String>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<Uuid, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh connection with no room association.
    pub fn connect(&mut self, connection: Uuid) {
        self.sessions.insert(connection, Session::default());
    }

    /// Forget a connection entirely. Callers leave the room first.
    pub fn disconnect(&mut self, connection: Uuid) {
        self.sessions.remove(&connection);
    }

    pub fn room_of(&self, connection: Uuid) -> Option<&str> {
        self.sessions
            .get(&connection)?
            .room_id
            .as_deref()
    }

    /// Join `connection` to a room, spawning its participant on a random
    /// walkable cell. A successful join leaves the previous room, if any;
    /// the id of that room is returned so callers can refresh its roster.
    ///
    /// Unknown room ids and exhausted spawn sampling both fail without any
    /// state change: the connection stays in whatever room it was in.
    pub fn join(
        &mut self,
        store: &mut RoomStore,
        connection: Uuid,
        room_id: &str,
        appearance: Appearance,
    ) -> Result<Option<String>, RoomError> {
        if !self.sessions.contains_key(&connection) {
            return Err(RoomError::NotInRoom);
        }
        // Validate the target and reserve a spawn cell before touching the
        // current room; a refused join must leave no trace.
        let spawn = {
            let room = store
                .room(room_id)
                .ok_or_else(|| RoomError::UnknownRoom(room_id.to_string()))?;
            random_spawn(&room.grid, &mut rand::thread_rng())?
        };

        let previous = self.leave(store, connection);
        let room = store
            .room_mut(room_id)
            .ok_or_else(|| RoomError::UnknownRoom(room_id.to_string()))?;
        room.participants
            .push(Participant::new(connection, spawn, appearance));
        if let Some(session) = self.sessions.get_mut(&connection) {
            session.room_id = Some(room_id.to_string());
        }
        debug!("Connection {} joined room '{}' at {}", connection, room_id, spawn);
        Ok(previous)
    }

    /// Remove the connection's participant from its room and clear the
    /// association. Returns the room id left, or `None` if it had no room.
    pub fn leave(&mut self, store: &mut RoomStore, connection: Uuid) -> Option<String> {
        let session = self.sessions.get_mut(&connection)?;
        let room_id = session.room_id.take()?;
        if let Some(room) = store.room_mut(&room_id) {
            room.remove_participant(connection);
        }
        Some(room_id)
    }

    /// Pathfind on a snapshot of the connection's room grid; on success set
    /// the participant's position to `from` and its path to the route.
    ///
    /// The destination is only "reached" once the rendering client finishes
    /// traversing the path — the server never advances position over time.
    pub fn request_move(
        &mut self,
        store: &mut RoomStore,
        connection: Uuid,
        from: Cell,
        to: Cell,
    ) -> Result<Participant, RoomError> {
        let room_id = self.room_of(connection).ok_or(RoomError::NotInRoom)?.to_string();
        let room = store
            .room_mut(&room_id)
            .ok_or_else(|| RoomError::UnknownRoom(room_id.clone()))?;

        // Private snapshot: an edit landing mid-search cannot corrupt it.
        let route = find_path(room.grid.clone(), from, to)?;

        let participant = room
            .participant_mut(connection)
            .ok_or(RoomError::NotInRoom)?;
        participant.position = from;
        participant.path = route;
        Ok(participant.clone())
    }

    pub fn set_edit_permission(
        &mut self,
        store: &mut RoomStore,
        connection: Uuid,
        granted: bool,
    ) -> Result<(), RoomError> {
        let room_id = self.room_of(connection).ok_or(RoomError::NotInRoom)?.to_string();
        let participant = store
            .room_mut(&room_id)
            .and_then(|room| room.participant_mut(connection))
            .ok_or(RoomError::NotInRoom)?;
        participant.can_edit_room = granted;
        Ok(())
    }
}

/// Uniformly sample grid cells until a walkable one turns up, bounded at
/// [`SPAWN_ATTEMPTS`]. A full grid yields an explicit error, never an
/// unresolved position.
pub fn random_spawn(grid: &OccupancyGrid, rng: &mut impl Rng) -> Result<Cell, RoomError> {
    for _ in 0..SPAWN_ATTEMPTS {
        let x = rng.gen_range(0..grid.width());
        let y = rng.gen_range(0..grid.height());
        if grid.is_walkable(x, y) {
            return Ok(Cell::new(x, y));
        }
    }
    Err(RoomError::NoSpawnSpace(SPAWN_ATTEMPTS))
}
