//! Atrium Room Service
//!
//! A small fleet of shared virtual rooms in which connected participants
//! move around a grid, place furniture, and see each other in real time.
//!
//! ## Architecture
//!
//! ```text
//! server  (server.rs)  ← WebSocket transport, fan-out
//!   └── RoomCoordinator  (coordinator.rs)  ← event orchestration
//!         ├── SessionRegistry  (session.rs) ← connection → participant
//!         └── RoomStore  (store.rs)         ← rooms, items, persistence
//!               ├── OccupancyGrid  (grid.rs)
//!               └── find_path  (path.rs)
//! ```
//!
//! Every inbound event is handled to completion while holding the
//! coordinator lock, so room state never sees two mutations interleave.
//! Pathfinding runs on a private clone of the room grid, and persistence
//! goes through a single-writer task that always writes the newest
//! full-document snapshot.

pub mod coordinator;
pub mod error;
pub mod grid;
pub mod path;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

// Convenience re-exports
pub use coordinator::{Outbound, Recipients, RoomCoordinator};
pub use error::RoomError;
pub use grid::OccupancyGrid;
pub use session::SessionRegistry;
pub use store::{Room, RoomStore};
pub use types::{Appearance, Cell, Item, MapSnapshot, Participant, RoomSummary};
