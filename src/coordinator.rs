//! RoomCoordinator – turns inbound client events into state mutations and
//! broadcast decisions.
//!
//! The coordinator never touches the transport. Every handler returns the
//! full set of [`Outbound`] messages the caller should deliver, so the
//! decision layer stays synchronous and directly testable. Protocol misuse
//! (unknown room, no active participant, forbidden or empty edit, blocked
//! move) produces no reply and no state change, matching the reference
//! behaviour; only a failed password check answers the sender.

use crate::error::RoomError;
use crate::grid::validate_layout;
use crate::protocol::{
    ClientEvent, MapUpdate, MoveRequest, PlayerChat, PlayerRef, RoomJoined, ServerEvent, Welcome,
};
use crate::session::{random_spawn, SessionRegistry};
use crate::store::RoomStore;
use crate::types::{item_catalog, Appearance, Item};
use log::{debug, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Broadcast decisions
// ---------------------------------------------------------------------------

/// Who should receive an outbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    One(Uuid),
    /// A room-scoped group, already expanded to connection ids.
    Many(Vec<Uuid>),
    /// Every live connection, regardless of room (lobby view spans rooms).
    All,
}

#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipients,
    pub event: ServerEvent,
}

impl Outbound {
    fn one(connection: Uuid, event: ServerEvent) -> Self {
        Self {
            to: Recipients::One(connection),
            event,
        }
    }

    fn room(connections: Vec<Uuid>, event: ServerEvent) -> Self {
        Self {
            to: Recipients::Many(connections),
            event,
        }
    }

    fn all(event: ServerEvent) -> Self {
        Self {
            to: Recipients::All,
            event,
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct RoomCoordinator {
    store: RoomStore,
    sessions: SessionRegistry,
}

impl RoomCoordinator {
    pub fn new(store: RoomStore) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    /// Register a new connection and greet it with the room list and the
    /// item catalog.
    pub fn on_connect(&mut self, connection: Uuid) -> Vec<Outbound> {
        self.sessions.connect(connection);
        vec![Outbound::one(
            connection,
            ServerEvent::Welcome(Welcome {
                rooms: self.store.list_summaries(),
                items: item_catalog(),
            }),
        )]
    }

    /// Tear down a connection, leaving its room if it had one.
    pub fn on_disconnect(&mut self, connection: Uuid) -> Vec<Outbound> {
        let mut out = Vec::new();
        if let Some(room_id) = self.sessions.leave(&mut self.store, connection) {
            out.extend(self.room_update(&room_id));
        }
        self.sessions.disconnect(connection);
        out
    }

    /// Handle one inbound event to completion.
    pub fn handle(&mut self, connection: Uuid, event: ClientEvent) -> Vec<Outbound> {
        match event {
            ClientEvent::JoinRoom(join) => {
                self.join_room(connection, &join.room_id, join.avatar_url)
            }
            ClientEvent::LeaveRoom => self.leave_room(connection),
            ClientEvent::CharacterAvatarUpdate(update) => {
                self.avatar_update(connection, update.avatar_url)
            }
            ClientEvent::Move(request) => self.request_move(connection, request),
            ClientEvent::Dance => self.to_own_room(connection, |id| {
                ServerEvent::PlayerDance(PlayerRef { id })
            }),
            ClientEvent::ChatMessage(chat) => self.to_own_room(connection, |id| {
                ServerEvent::PlayerChatMessage(PlayerChat {
                    id,
                    message: chat.message.clone(),
                })
            }),
            ClientEvent::PasswordCheck(check) => self.password_check(connection, &check.password),
            ClientEvent::ItemsUpdate(update) => self.items_update(connection, update.items),
        }
    }

    // -----------------------------------------------------------------------
    // Join / leave
    // -----------------------------------------------------------------------

    fn join_room(
        &mut self,
        connection: Uuid,
        room_id: &str,
        avatar_url: Option<String>,
    ) -> Vec<Outbound> {
        let appearance = Appearance {
            avatar_url,
            ..Appearance::default()
        };
        // A connection lives in exactly one room; a successful join implies
        // leaving the previous one. A refused join must disturb nothing, so
        // the registry swaps rooms only after the target is validated.
        let previous = match self
            .sessions
            .join(&mut self.store, connection, room_id, appearance)
        {
            Ok(previous) => previous,
            Err(e) => {
                debug!("Join to '{}' dropped: {}", room_id, e);
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        if let Some(previous) = previous {
            out.extend(self.room_update(&previous));
        }

        // Join succeeded, so the room exists.
        if let Some(room) = self.store.room(room_id) {
            out.push(Outbound::one(
                connection,
                ServerEvent::RoomJoined(RoomJoined {
                    map: room.map_snapshot(),
                    characters: room.participants.clone(),
                    id: connection,
                }),
            ));
        }
        out.extend(self.room_update(room_id));
        out
    }

    fn leave_room(&mut self, connection: Uuid) -> Vec<Outbound> {
        match self.sessions.leave(&mut self.store, connection) {
            Some(room_id) => self.room_update(&room_id),
            None => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Participant state
    // -----------------------------------------------------------------------

    fn avatar_update(&mut self, connection: Uuid, avatar_url: String) -> Vec<Outbound> {
        let Some(room_id) = self.sessions.room_of(connection).map(String::from) else {
            return Vec::new();
        };
        let Some(room) = self.store.room_mut(&room_id) else {
            return Vec::new();
        };
        let Some(participant) = room.participant_mut(connection) else {
            return Vec::new();
        };
        participant.appearance.avatar_url = Some(avatar_url);

        let characters = room.participants.clone();
        vec![Outbound::room(
            self.room_connections(&room_id),
            ServerEvent::Characters(characters),
        )]
    }

    fn request_move(&mut self, connection: Uuid, request: MoveRequest) -> Vec<Outbound> {
        match self
            .sessions
            .request_move(&mut self.store, connection, request.from, request.to)
        {
            Ok(participant) => {
                let room_id = self
                    .sessions
                    .room_of(connection)
                    .map(String::from)
                    .unwrap_or_default();
                vec![Outbound::room(
                    self.room_connections(&room_id),
                    ServerEvent::PlayerMove(participant),
                )]
            }
            Err(e) => {
                debug!("Move dropped for {}: {}", connection, e);
                Vec::new()
            }
        }
    }

    /// Broadcast an event built from the sender's id to the sender's room.
    fn to_own_room(
        &mut self,
        connection: Uuid,
        build: impl Fn(Uuid) -> ServerEvent,
    ) -> Vec<Outbound> {
        match self.sessions.room_of(connection).map(String::from) {
            Some(room_id) => vec![Outbound::room(
                self.room_connections(&room_id),
                build(connection),
            )],
            None => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    fn password_check(&mut self, connection: Uuid, password: &str) -> Vec<Outbound> {
        let Some(room_id) = self.sessions.room_of(connection).map(String::from) else {
            return Vec::new();
        };
        let granted = self
            .store
            .room(&room_id)
            .and_then(|room| room.password.as_deref())
            .map(|expected| expected == password)
            .unwrap_or(false);

        let reply = if granted {
            if let Err(e) = self
                .sessions
                .set_edit_permission(&mut self.store, connection, true)
            {
                debug!("Password accepted but permission not stored: {}", e);
                return Vec::new();
            }
            ServerEvent::PasswordCheckSuccess
        } else {
            ServerEvent::PasswordCheckFail
        };
        vec![Outbound::one(connection, reply)]
    }

    fn items_update(&mut self, connection: Uuid, items: Vec<Item>) -> Vec<Outbound> {
        let Some(room_id) = self.sessions.room_of(connection).map(String::from) else {
            return Vec::new();
        };
        let permitted = self
            .store
            .room(&room_id)
            .and_then(|room| room.participant(connection))
            .map(|p| p.can_edit_room)
            .unwrap_or(false);
        if !permitted {
            debug!("Edit from {} dropped: {}", connection, RoomError::EditNotPermitted);
            return Vec::new();
        }
        if items.is_empty() {
            debug!("Edit from {} dropped: {}", connection, RoomError::EmptyItemList);
            return Vec::new();
        }

        // Re-validate the whole submitted layout server-side; the client's
        // interactive droppable check is advisory only.
        let grid_size = match self.store.room(&room_id) {
            Some(room) => room.grid_size(),
            None => return Vec::new(),
        };
        if let Err(index) = validate_layout(&items, grid_size) {
            debug!(
                "Edit from {} dropped: {}",
                connection,
                RoomError::InvalidLayout(index)
            );
            return Vec::new();
        }

        if let Err(e) = self.store.replace_items(&room_id, items) {
            warn!("Edit to '{}' failed to persist: {}", room_id, e);
            return Vec::new();
        }

        // Layout changed under everyone's feet: clear paths and respawn.
        if let Some(room) = self.store.room_mut(&room_id) {
            let grid = room.grid.clone();
            for participant in &mut room.participants {
                participant.path.clear();
                match random_spawn(&grid, &mut rand::thread_rng()) {
                    Ok(cell) => participant.position = cell,
                    Err(e) => warn!(
                        "Respawn failed for {} after edit, keeping position: {}",
                        participant.id, e
                    ),
                }
            }
        }

        let Some(room) = self.store.room(&room_id) else {
            return Vec::new();
        };
        vec![Outbound::room(
            self.room_connections(&room_id),
            ServerEvent::MapUpdate(MapUpdate {
                map: room.map_snapshot(),
                characters: room.participants.clone(),
            }),
        )]
    }

    // -----------------------------------------------------------------------
    // Broadcast helpers
    // -----------------------------------------------------------------------

    fn room_connections(&self, room_id: &str) -> Vec<Uuid> {
        self.store
            .room(room_id)
            .map(|room| room.participants.iter().map(|p| p.id).collect())
            .unwrap_or_default()
    }

    /// Participant list to the room plus refreshed summaries to everyone.
    fn room_update(&self, room_id: &str) -> Vec<Outbound> {
        let mut out = Vec::new();
        if let Some(room) = self.store.room(room_id) {
            out.push(Outbound::room(
                self.room_connections(room_id),
                ServerEvent::Characters(room.participants.clone()),
            ));
        }
        out.push(Outbound::all(ServerEvent::Rooms(self.store.list_summaries())));
        out
    }
}
