//! WebSocket transport: accepts connections, feeds inbound frames through
//! the coordinator one at a time, and fans outbound decisions back out.
//!
//! Each connection gets an unbounded outbound channel drained by its own
//! send task; broadcasting is a lookup in the shared sender map. Handler
//! failures (unparseable frames, dead sockets) are isolated per connection
//! and never reach the coordinator state.
//!
//! Every batch of broadcast decisions is pushed into the per-connection
//! channels while the coordinator lock is still held. State snapshots
//! therefore reach each socket's queue in the order they were decided,
//! even with handlers racing on the multithreaded runtime. The lock order
//! is always coordinator first, sender map second.

use crate::coordinator::{Outbound, Recipients, RoomCoordinator};
use crate::protocol::ClientEvent;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

type OutboundSender = mpsc::UnboundedSender<Message>;

/// Shared state: the coordinator (all room/session mutation happens under
/// its lock, one event at a time) and the live sender map.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<Mutex<RoomCoordinator>>,
    connections: Arc<Mutex<HashMap<Uuid, OutboundSender>>>,
}

impl AppState {
    pub fn new(coordinator: RoomCoordinator) -> Self {
        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Resolve recipients to senders and deliver. Dead senders are pruned;
    /// their sockets will run their own cleanup path shortly.
    fn dispatch(&self, outbound: Vec<Outbound>) {
        let mut connections = self.connections.lock();
        for Outbound { to, event } in outbound {
            let frame = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::warn!("Failed to serialize {}: {}", event.name(), e);
                    continue;
                }
            };
            match to {
                Recipients::One(id) => {
                    if let Some(tx) = connections.get(&id) {
                        if tx.send(frame).is_err() {
                            connections.remove(&id);
                        }
                    }
                }
                Recipients::Many(ids) => {
                    for id in ids {
                        if let Some(tx) = connections.get(&id) {
                            if tx.send(frame.clone()).is_err() {
                                connections.remove(&id);
                            }
                        }
                    }
                }
                Recipients::All => {
                    connections.retain(|_, tx| tx.send(frame.clone()).is_ok());
                }
            }
        }
    }
}

/// Build the service router: the WebSocket endpoint plus the CORS layer for
/// the configured client origin.
pub fn router(state: AppState, allowed_origin: &str) -> Router {
    let cors = match allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            tracing::warn!("Invalid CLIENT_URL '{}', allowing any origin", allowed_origin);
            CorsLayer::permissive()
        }
    };
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let connection = Uuid::new_v4();

    state.connections.lock().insert(connection, tx);
    tracing::info!("Connection {} opened", connection);

    // welcome must reach the client before any inbound event is processed
    {
        let mut coordinator = state.coordinator.lock();
        let greeting = coordinator.on_connect(connection);
        state.dispatch(greeting);
    }

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    let mut coordinator = state.coordinator.lock();
                    let outbound = coordinator.handle(connection, event);
                    state.dispatch(outbound);
                }
                Err(e) => {
                    tracing::warn!("Unparseable frame from {}: {}", connection, e);
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("Connection {} closed by peer", connection);
                break;
            }
            Ok(_) => {
                // binary/ping/pong frames carry nothing in this protocol
            }
            Err(e) => {
                tracing::warn!("WebSocket error on {}: {}", connection, e);
                break;
            }
        }
    }

    {
        let mut coordinator = state.coordinator.lock();
        let farewell = coordinator.on_disconnect(connection);
        state.connections.lock().remove(&connection);
        state.dispatch(farewell);
    }
    send_task.abort();
    tracing::info!("Connection {} removed", connection);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::RoomCoordinator;
    use crate::protocol::{PlayerChat, ServerEvent};
    use crate::store::RoomStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn empty_state() -> AppState {
        let store = RoomStore::from_definitions(Vec::new(), "unused.json");
        AppState::new(RoomCoordinator::new(store))
    }

    fn chat_to(target: Uuid, message: String) -> Outbound {
        Outbound {
            to: Recipients::One(target),
            event: ServerEvent::PlayerChatMessage(PlayerChat {
                id: target,
                message,
            }),
        }
    }

    #[test]
    fn racing_batches_reach_a_socket_in_decision_order() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .build()
            .unwrap();
        runtime.block_on(async {
            let state = empty_state();
            let target = Uuid::new_v4();
            let (tx, mut rx) = mpsc::unbounded_channel();
            state.connections.lock().insert(target, tx);

            // Same decide-then-deliver sequence handle_socket runs: the
            // coordinator lock stays held until the batch is queued.
            let decided = Arc::new(AtomicU64::new(0));
            let mut workers = Vec::new();
            for _ in 0..4 {
                let state = state.clone();
                let decided = Arc::clone(&decided);
                workers.push(tokio::spawn(async move {
                    for _ in 0..50 {
                        let _coordinator = state.coordinator.lock();
                        let seq = decided.fetch_add(1, Ordering::SeqCst);
                        state.dispatch(vec![chat_to(target, seq.to_string())]);
                    }
                }));
            }
            for worker in workers {
                worker.await.unwrap();
            }

            let mut received = Vec::new();
            while let Ok(Message::Text(text)) = rx.try_recv() {
                let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
                let seq: u64 = frame["data"]["message"].as_str().unwrap().parse().unwrap();
                received.push(seq);
            }
            assert_eq!(received.len(), 200);
            let mut sorted = received.clone();
            sorted.sort_unstable();
            assert_eq!(received, sorted);
        });
    }

    #[test]
    fn dead_senders_are_pruned_on_dispatch() {
        let state = empty_state();
        let gone = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.lock().insert(gone, tx);
        drop(rx);

        state.dispatch(vec![chat_to(gone, "anyone there?".into())]);
        assert_eq!(state.connection_count(), 0);
    }
}
