//! Crate-wide error taxonomy.
//!
//! Most variants are *quiet*: the coordinator logs them and emits nothing,
//! because the reference protocol never surfaces misuse to the sender. Only
//! `NoPersistedRooms` is fatal, and only a failed password check produces an
//! explicit reply.

use crate::types::Cell;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoomError {
    /// Neither the persisted document nor the bundled default set parsed.
    #[error("no usable room document: {0}")]
    NoPersistedRooms(String),

    #[error("unknown room id: {0}")]
    UnknownRoom(String),

    #[error("connection has no active participant")]
    NotInRoom,

    #[error("no walkable route from {0} to {1}")]
    NoPath(Cell, Cell),

    #[error("no walkable spawn cell found within {0} attempts")]
    NoSpawnSpace(u32),

    #[error("room edit not permitted for this connection")]
    EditNotPermitted,

    #[error("submitted item list is empty")]
    EmptyItemList,

    #[error("submitted layout is out of bounds or overlapping at item {0}")]
    InvalidLayout(usize),

    #[error("failed to persist room document: {0}")]
    Persist(#[from] std::io::Error),
}
