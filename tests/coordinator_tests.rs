//! RoomCoordinator end-to-end tests (no transport: events in, broadcast
//! decisions out)

#[cfg(test)]
mod tests {
    use atrium::coordinator::{Outbound, Recipients, RoomCoordinator};
    use atrium::protocol::{
        ChatMessage, ClientEvent, ItemsUpdate, JoinRoom, MoveRequest, PasswordCheck, ServerEvent,
    };
    use atrium::store::{RoomDefinition, RoomStore};
    use atrium::types::{Cell, Item};
    use tempfile::TempDir;
    use uuid::Uuid;

    const STUDIO_PASSWORD: &str = "tracker";

    fn make_coordinator(dir: &TempDir, studio_items: Vec<Item>) -> RoomCoordinator {
        let definitions = vec![
            RoomDefinition {
                id: "studio".into(),
                name: "Studio".into(),
                password: Some(STUDIO_PASSWORD.into()),
                items: studio_items,
            },
            RoomDefinition {
                id: "annex".into(),
                name: "Annex".into(),
                password: None,
                items: vec![],
            },
        ];
        RoomCoordinator::new(RoomStore::from_definitions(
            definitions,
            dir.path().join("rooms.json"),
        ))
    }

    fn join(coordinator: &mut RoomCoordinator, connection: Uuid, room_id: &str) -> Vec<Outbound> {
        coordinator.handle(
            connection,
            ClientEvent::JoinRoom(JoinRoom {
                room_id: room_id.into(),
                avatar_url: Some("https://models.example/a.glb".into()),
            }),
        )
    }

    fn item(size: [u32; 2], at: [u32; 2]) -> Item {
        Item {
            name: "item-test".into(),
            size,
            grid_position: Cell::new(at[0], at[1]),
            rotation: 0,
            walkable: false,
            wall: false,
        }
    }

    fn named<'a>(out: &'a [Outbound], name: &str) -> Vec<&'a Outbound> {
        out.iter().filter(|o| o.event.name() == name).collect()
    }

    // -----------------------------------------------------------------------
    // Connect / join / leave
    // -----------------------------------------------------------------------

    #[test]
    fn welcome_greets_with_summaries_and_catalog() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let connection = Uuid::new_v4();

        let out = coordinator.on_connect(connection);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipients::One(connection));
        match &out[0].event {
            ServerEvent::Welcome(welcome) => {
                let ids: Vec<_> = welcome.rooms.iter().map(|r| r.id.as_str()).collect();
                assert_eq!(ids, vec!["studio", "annex"]);
                assert!(!welcome.items.is_empty());
            }
            other => panic!("expected welcome, got {}", other.name()),
        }
    }

    #[test]
    fn join_unknown_room_creates_nothing_and_stays_silent() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);

        let out = join(&mut coordinator, connection, "nowhere");
        assert!(named(&out, "roomJoined").is_empty());
        assert!(coordinator
            .store()
            .rooms()
            .iter()
            .all(|room| room.participants.is_empty()));
    }

    #[test]
    fn unknown_room_join_leaves_the_current_room_untouched() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "studio");

        let out = join(&mut coordinator, connection, "nowhere");
        assert!(out.is_empty());
        assert_eq!(
            coordinator.store().room("studio").unwrap().participants.len(),
            1
        );

        // The session association survived too: room events still land.
        let out = coordinator.handle(connection, ClientEvent::Dance);
        assert_eq!(named(&out, "playerDance").len(), 1);
    }

    #[test]
    fn join_spawns_participant_and_broadcasts() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);

        let out = join(&mut coordinator, connection, "studio");

        let joined = named(&out, "roomJoined");
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].to, Recipients::One(connection));
        match &joined[0].event {
            ServerEvent::RoomJoined(payload) => {
                assert_eq!(payload.id, connection);
                assert_eq!(payload.characters.len(), 1);
                assert_eq!(payload.map.size, [70, 70]);
            }
            _ => unreachable!(),
        }

        // Roster to the room, refreshed summaries to everyone.
        assert_eq!(named(&out, "characters").len(), 1);
        let rooms = named(&out, "rooms");
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].to, Recipients::All);
        match &rooms[0].event {
            ServerEvent::Rooms(summaries) => {
                assert_eq!(summaries[0].nb_characters, 1);
            }
            _ => unreachable!(),
        }

        let room = coordinator.store().room("studio").unwrap();
        let participant = room.participant(connection).unwrap();
        assert!(participant.path.is_empty());
        assert!(room
            .grid
            .is_walkable(participant.position.x, participant.position.y));
        assert!(!participant.can_edit_room);
    }

    #[test]
    fn rejoining_moves_the_participant_between_rooms() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "studio");

        join(&mut coordinator, connection, "annex");
        assert!(coordinator
            .store()
            .room("studio")
            .unwrap()
            .participants
            .is_empty());
        assert_eq!(
            coordinator.store().room("annex").unwrap().participants.len(),
            1
        );
    }

    #[test]
    fn leave_and_disconnect_refresh_the_lobby() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let (alpha, beta) = (Uuid::new_v4(), Uuid::new_v4());
        coordinator.on_connect(alpha);
        coordinator.on_connect(beta);
        join(&mut coordinator, alpha, "studio");
        join(&mut coordinator, beta, "studio");

        let out = coordinator.handle(alpha, ClientEvent::LeaveRoom);
        let characters = named(&out, "characters");
        assert_eq!(characters[0].to, Recipients::Many(vec![beta]));
        match &named(&out, "rooms")[0].event {
            ServerEvent::Rooms(summaries) => assert_eq!(summaries[0].nb_characters, 1),
            _ => unreachable!(),
        }

        let out = coordinator.on_disconnect(beta);
        match &named(&out, "rooms")[0].event {
            ServerEvent::Rooms(summaries) => assert_eq!(summaries[0].nb_characters, 0),
            _ => unreachable!(),
        }
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    #[test]
    fn accepted_move_broadcasts_position_and_path() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "studio");

        let out = coordinator.handle(
            connection,
            ClientEvent::Move(MoveRequest {
                from: Cell::new(0, 0),
                to: Cell::new(5, 5),
            }),
        );
        let moves = named(&out, "playerMove");
        assert_eq!(moves.len(), 1);
        match &moves[0].event {
            ServerEvent::PlayerMove(participant) => {
                assert_eq!(participant.position, Cell::new(0, 0));
                assert_eq!(participant.path.first(), Some(&Cell::new(0, 0)));
                assert_eq!(participant.path.last(), Some(&Cell::new(5, 5)));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn move_to_enclosed_cell_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        // Ring of items around (5,5): the cell is walkable but unreachable.
        let ring = vec![
            item([3, 1], [4, 4]),
            item([3, 1], [4, 6]),
            item([1, 1], [4, 5]),
            item([1, 1], [6, 5]),
        ];
        let mut coordinator = make_coordinator(&dir, ring);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "studio");

        let spawn = coordinator
            .store()
            .room("studio")
            .unwrap()
            .participant(connection)
            .unwrap()
            .position;

        let out = coordinator.handle(
            connection,
            ClientEvent::Move(MoveRequest {
                from: Cell::new(0, 0),
                to: Cell::new(5, 5),
            }),
        );
        assert!(out.is_empty());

        let participant_position = coordinator
            .store()
            .room("studio")
            .unwrap()
            .participant(connection)
            .unwrap()
            .position;
        assert_eq!(participant_position, spawn);
    }

    #[test]
    fn move_without_a_room_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);

        let out = coordinator.handle(
            connection,
            ClientEvent::Move(MoveRequest {
                from: Cell::new(0, 0),
                to: Cell::new(5, 5),
            }),
        );
        assert!(out.is_empty());
    }

    // -----------------------------------------------------------------------
    // Dance / chat
    // -----------------------------------------------------------------------

    #[test]
    fn dance_and_chat_reach_the_whole_room() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let (alpha, beta) = (Uuid::new_v4(), Uuid::new_v4());
        coordinator.on_connect(alpha);
        coordinator.on_connect(beta);
        join(&mut coordinator, alpha, "studio");
        join(&mut coordinator, beta, "studio");

        let out = coordinator.handle(alpha, ClientEvent::Dance);
        let dances = named(&out, "playerDance");
        assert_eq!(dances.len(), 1);
        assert_eq!(dances[0].to, Recipients::Many(vec![alpha, beta]));

        let out = coordinator.handle(
            beta,
            ClientEvent::ChatMessage(ChatMessage {
                message: "over here".into(),
            }),
        );
        match &named(&out, "playerChatMessage")[0].event {
            ServerEvent::PlayerChatMessage(chat) => {
                assert_eq!(chat.id, beta);
                assert_eq!(chat.message, "over here");
            }
            _ => unreachable!(),
        }
    }

    // -----------------------------------------------------------------------
    // Password / editing
    // -----------------------------------------------------------------------

    fn grant_edit(coordinator: &mut RoomCoordinator, connection: Uuid) {
        let out = coordinator.handle(
            connection,
            ClientEvent::PasswordCheck(PasswordCheck {
                password: STUDIO_PASSWORD.into(),
            }),
        );
        assert_eq!(named(&out, "passwordCheckSuccess").len(), 1);
    }

    #[test]
    fn wrong_password_fails_to_requester_only() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "studio");

        let out = coordinator.handle(
            connection,
            ClientEvent::PasswordCheck(PasswordCheck {
                password: "wrong".into(),
            }),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipients::One(connection));
        assert_eq!(out[0].event.name(), "passwordCheckFail");
        assert!(!coordinator
            .store()
            .room("studio")
            .unwrap()
            .participant(connection)
            .unwrap()
            .can_edit_room);
    }

    #[test]
    fn passwordless_rooms_never_grant_editing() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "annex");

        let out = coordinator.handle(
            connection,
            ClientEvent::PasswordCheck(PasswordCheck {
                password: "".into(),
            }),
        );
        assert_eq!(out[0].event.name(), "passwordCheckFail");
    }

    #[test]
    fn edit_without_permission_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![item([2, 2], [10, 10])]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "studio");

        let out = coordinator.handle(
            connection,
            ClientEvent::ItemsUpdate(ItemsUpdate {
                items: vec![item([2, 2], [20, 20])],
            }),
        );
        assert!(out.is_empty());
        let room = coordinator.store().room("studio").unwrap();
        assert_eq!(room.items[0].grid_position, Cell::new(10, 10));
    }

    #[test]
    fn empty_edit_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![item([2, 2], [10, 10])]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "studio");
        grant_edit(&mut coordinator, connection);

        let out = coordinator.handle(
            connection,
            ClientEvent::ItemsUpdate(ItemsUpdate { items: vec![] }),
        );
        assert!(out.is_empty());
        assert_eq!(coordinator.store().room("studio").unwrap().items.len(), 1);
    }

    #[test]
    fn invalid_layout_is_rejected_atomically() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![item([2, 2], [10, 10])]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "studio");
        grant_edit(&mut coordinator, connection);

        // Overlapping pair: the whole submission is refused.
        let out = coordinator.handle(
            connection,
            ClientEvent::ItemsUpdate(ItemsUpdate {
                items: vec![item([4, 4], [20, 20]), item([4, 4], [22, 22])],
            }),
        );
        assert!(out.is_empty());
        let room = coordinator.store().room("studio").unwrap();
        assert_eq!(room.items.len(), 1);
        assert_eq!(room.items[0].grid_position, Cell::new(10, 10));

        // Out-of-bounds offender: same refusal.
        let out = coordinator.handle(
            connection,
            ClientEvent::ItemsUpdate(ItemsUpdate {
                items: vec![item([4, 4], [139, 139])],
            }),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn accepted_edit_broadcasts_map_and_respawns() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = make_coordinator(&dir, vec![item([2, 2], [10, 10])]);
        let connection = Uuid::new_v4();
        coordinator.on_connect(connection);
        join(&mut coordinator, connection, "studio");
        grant_edit(&mut coordinator, connection);

        // Give the participant a pending path so the reset is observable.
        coordinator.handle(
            connection,
            ClientEvent::Move(MoveRequest {
                from: Cell::new(0, 0),
                to: Cell::new(30, 30),
            }),
        );

        let out = coordinator.handle(
            connection,
            ClientEvent::ItemsUpdate(ItemsUpdate {
                items: vec![item([3, 3], [40, 40]), item([2, 2], [60, 60])],
            }),
        );
        let updates = named(&out, "mapUpdate");
        assert_eq!(updates.len(), 1);
        match &updates[0].event {
            ServerEvent::MapUpdate(update) => {
                assert_eq!(update.map.items.len(), 2);
                assert_eq!(update.characters.len(), 1);
                assert!(update.characters[0].path.is_empty());
            }
            _ => unreachable!(),
        }

        let room = coordinator.store().room("studio").unwrap();
        let participant = room.participant(connection).unwrap();
        assert!(participant.path.is_empty());
        assert!(room
            .grid
            .is_walkable(participant.position.x, participant.position.y));

        // The edit reached disk (store with no writer persists in line).
        let reloaded = RoomStore::load(dir.path().join("rooms.json")).unwrap();
        assert_eq!(reloaded.room("studio").unwrap().items.len(), 2);
    }
}
