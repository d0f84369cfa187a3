//! Wire protocol between the room service and its clients.
//!
//! This module owns **every message that crosses the WebSocket boundary**.
//! Frames are JSON objects tagged by `event` with the payload under `data`,
//! and all field names are camelCase to match the client's data model.
//!
//! ## Inbound (connection → server)
//!
//! | Event                   | Payload              | Effect                      |
//! |-------------------------|----------------------|-----------------------------|
//! | `joinRoom`              | roomId, avatarUrl?   | join a room, spawn          |
//! | `leaveRoom`             | —                    | leave current room          |
//! | `characterAvatarUpdate` | avatarUrl            | update appearance           |
//! | `move`                  | from, to (cells)     | pathfind and move           |
//! | `dance`                 | —                    | ephemeral dance notice      |
//! | `chatMessage`           | message              | chat notice to room         |
//! | `passwordCheck`         | password             | grant/deny edit permission  |
//! | `itemsUpdate`           | items                | replace room layout         |
//!
//! ## Outbound (server → connection / room / all)
//!
//! | Event                  | Scope     | Payload                            |
//! |------------------------|-----------|------------------------------------|
//! | `welcome`              | sender    | room summaries + item catalog      |
//! | `roomJoined`           | joiner    | map, characters, own id            |
//! | `characters`           | room      | full participant list              |
//! | `rooms`                | all       | room summaries                     |
//! | `playerMove`           | room      | moved participant                  |
//! | `playerDance`          | room      | sender id                          |
//! | `playerChatMessage`    | room      | sender id + message                |
//! | `passwordCheckSuccess` | requester | —                                  |
//! | `passwordCheckFail`    | requester | —                                  |
//! | `mapUpdate`            | room      | new map + reset participants       |

use crate::types::{Cell, Item, ItemSpec, MapSnapshot, Participant, RoomSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinRoom(JoinRoom),
    LeaveRoom,
    CharacterAvatarUpdate(AvatarUpdate),
    Move(MoveRequest),
    Dance,
    ChatMessage(ChatMessage),
    PasswordCheck(PasswordCheck),
    ItemsUpdate(ItemsUpdate),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarUpdate {
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: Cell,
    pub to: Cell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordCheck {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsUpdate {
    pub items: Vec<Item>,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Welcome(Welcome),
    RoomJoined(RoomJoined),
    Characters(Vec<Participant>),
    Rooms(Vec<RoomSummary>),
    PlayerMove(Participant),
    PlayerDance(PlayerRef),
    PlayerChatMessage(PlayerChat),
    PasswordCheckSuccess,
    PasswordCheckFail,
    MapUpdate(MapUpdate),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Welcome {
    pub rooms: Vec<RoomSummary>,
    /// Static catalog of placeable item types.
    pub items: BTreeMap<String, ItemSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoined {
    pub map: MapSnapshot,
    pub characters: Vec<Participant>,
    /// The joiner's own connection id.
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRef {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerChat {
    pub id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapUpdate {
    pub map: MapSnapshot,
    pub characters: Vec<Participant>,
}

impl ServerEvent {
    /// Wire-level event name (used in logs and test assertions).
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Welcome(_) => "welcome",
            ServerEvent::RoomJoined(_) => "roomJoined",
            ServerEvent::Characters(_) => "characters",
            ServerEvent::Rooms(_) => "rooms",
            ServerEvent::PlayerMove(_) => "playerMove",
            ServerEvent::PlayerDance(_) => "playerDance",
            ServerEvent::PlayerChatMessage(_) => "playerChatMessage",
            ServerEvent::PasswordCheckSuccess => "passwordCheckSuccess",
            ServerEvent::PasswordCheckFail => "passwordCheckFail",
            ServerEvent::MapUpdate(_) => "mapUpdate",
        }
    }
}
