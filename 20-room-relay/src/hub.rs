//! The hub owns every room and serializes all changes to them.
//!
//! A single task runs [`Hub::run`] and is the only code that ever touches the
//! room registry. Everything else talks to it through a cloneable
//! [`HubHandle`], which feeds four queues:
//!
//! - **register**: clients joining a room
//! - **unregister**: clients whose connection has ended
//! - **broadcast**: messages to fan out to a room
//! - **control**: room creation and read-only queries, each answered over a
//!   oneshot channel
//!
//! The loop waits on all four without a fixed priority. Items in one queue
//! are handled in arrival order; nothing is promised across queues.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::{
    client::{Client, ClientKey},
    config::RelayConfig,
    error::RelayError,
    message::ChatMessage,
    room::{ClientInfo, Room, RoomInfo, RoomStats},
};

/// Registry state mutated by the hub loop.
///
/// Kept separate from the loop so the membership rules can be exercised
/// without any scheduling in between.
#[derive(Default)]
pub struct HubState {
    rooms: HashMap<String, Room>,
}

impl HubState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an empty room, replacing any room with the same id. Members
    /// of a replaced room are dropped, which closes their connections.
    pub fn create_room(&mut self, info: RoomInfo) {
        let id = info.id.clone();
        if let Some(old) = self.rooms.insert(id.clone(), Room::new(info)) {
            info!(room = %id, evicted = old.len(), "room replaced");
        } else {
            info!(room = %id, "room created");
        }
    }

    /// Adds `client` to its room. Unknown rooms and ids already present are
    /// silent no-ops. Returns whether the client was added.
    pub fn register(&mut self, client: Client) -> bool {
        let Some(room) = self.rooms.get_mut(client.room_id()) else {
            debug!(room = %client.room_id(), client = %client.id(), "register for unknown room ignored");
            return false;
        };

        let (id, room_id) = (client.id().to_string(), client.room_id().to_string());
        let added = room.join(client);
        if added {
            info!(room = %room_id, client = %id, members = room.len(), "client registered");
        } else {
            debug!(room = %room_id, client = %id, "client id already present");
        }
        added
    }

    /// Removes the client identified by `key`. When members remain, they
    /// receive a leave notice. Returns whether the client was removed.
    pub fn unregister(&mut self, key: &ClientKey) -> bool {
        let Some(room) = self.rooms.get_mut(&key.room_id) else {
            return false;
        };
        let Some(client) = room.leave(key) else {
            return false;
        };
        // Closes the outbound queue so the write pump finishes.
        drop(client);

        info!(room = %key.room_id, client = %key.id, members = room.len(), "client unregistered");
        if !room.is_empty() {
            room.deliver(&ChatMessage::left(&key.id, &key.username, &key.room_id));
        }
        true
    }

    /// Offers `message` to every member of its room. Messages for unknown
    /// rooms are dropped. Returns the number of members that accepted it.
    pub fn broadcast(&mut self, message: &ChatMessage) -> usize {
        match self.rooms.get_mut(&message.room_id) {
            Some(room) => room.deliver(message),
            None => {
                debug!(room = %message.room_id, "broadcast to unknown room dropped");
                0
            }
        }
    }

    pub fn clients(&self, room_id: &str) -> Vec<ClientInfo> {
        self.rooms
            .get(room_id)
            .map(Room::clients)
            .unwrap_or_default()
    }

    pub fn rooms(&self) -> Vec<RoomInfo> {
        self.rooms.values().map(|room| room.info().clone()).collect()
    }

    pub fn stats(&self, room_id: &str) -> Option<RoomStats> {
        self.rooms.get(room_id).map(Room::stats)
    }
}

/// Requests that need an answer from the hub.
enum Control {
    CreateRoom {
        info: RoomInfo,
        respond_to: oneshot::Sender<RoomInfo>,
    },
    ListClients {
        room_id: String,
        respond_to: oneshot::Sender<Vec<ClientInfo>>,
    },
    ListRooms {
        respond_to: oneshot::Sender<Vec<RoomInfo>>,
    },
    RoomStats {
        room_id: String,
        respond_to: oneshot::Sender<Option<RoomStats>>,
    },
}

/// The hub event loop. Owns the registry and the receiving end of every
/// queue.
pub struct Hub {
    state: HubState,
    register_rx: mpsc::Receiver<Client>,
    unregister_rx: mpsc::Receiver<ClientKey>,
    broadcast_rx: mpsc::Receiver<ChatMessage>,
    control_rx: mpsc::Receiver<Control>,
}

impl Hub {
    /// Builds a hub and the handle used to reach it. The hub does nothing
    /// until [`Hub::run`] is polled.
    pub fn new(config: &RelayConfig) -> (Self, HubHandle) {
        let config = config.normalized();
        let (register_tx, register_rx) = mpsc::channel(config.membership_capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(config.membership_capacity);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_capacity);
        let (control_tx, control_rx) = mpsc::channel(config.broadcast_capacity);

        let hub = Self {
            state: HubState::new(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            control_rx,
        };
        let handle = HubHandle {
            register_tx,
            unregister_tx,
            broadcast_tx,
            control_tx,
        };
        (hub, handle)
    }

    /// Spawns the hub loop on the current runtime and returns its handle.
    pub fn spawn(config: &RelayConfig) -> HubHandle {
        let (hub, handle) = Self::new(config);
        tokio::spawn(hub.run());
        handle
    }

    /// Runs until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("hub started");
        loop {
            tokio::select! {
                Some(client) = self.register_rx.recv() => {
                    self.state.register(client);
                }
                Some(key) = self.unregister_rx.recv() => {
                    self.state.unregister(&key);
                }
                Some(message) = self.broadcast_rx.recv() => {
                    self.state.broadcast(&message);
                }
                Some(control) = self.control_rx.recv() => {
                    self.handle_control(control);
                }
                else => break,
            }
        }
        info!("hub stopped");
    }

    fn handle_control(&mut self, control: Control) {
        match control {
            Control::CreateRoom { info, respond_to } => {
                self.state.create_room(info.clone());
                let _ = respond_to.send(info);
            }
            Control::ListClients {
                room_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.clients(&room_id));
            }
            Control::ListRooms { respond_to } => {
                let _ = respond_to.send(self.state.rooms());
            }
            Control::RoomStats {
                room_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.stats(&room_id));
            }
        }
    }
}

/// Cloneable entry point to a running hub.
///
/// Every method fails with [`RelayError::HubClosed`] once the hub loop has
/// stopped.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<Client>,
    unregister_tx: mpsc::Sender<ClientKey>,
    broadcast_tx: mpsc::Sender<ChatMessage>,
    control_tx: mpsc::Sender<Control>,
}

impl HubHandle {
    pub async fn register(&self, client: Client) -> Result<(), RelayError> {
        self.register_tx
            .send(client)
            .await
            .map_err(|_| RelayError::HubClosed)
    }

    pub async fn unregister(&self, key: ClientKey) -> Result<(), RelayError> {
        self.unregister_tx
            .send(key)
            .await
            .map_err(|_| RelayError::HubClosed)
    }

    /// Queues `message` for fan-out. Waits while the broadcast queue is full.
    pub async fn broadcast(&self, message: ChatMessage) -> Result<(), RelayError> {
        self.broadcast_tx
            .send(message)
            .await
            .map_err(|_| RelayError::HubClosed)
    }

    pub async fn create_room(&self, info: RoomInfo) -> Result<RoomInfo, RelayError> {
        self.request(|respond_to| Control::CreateRoom { info, respond_to })
            .await
    }

    pub async fn list_clients(&self, room_id: &str) -> Result<Vec<ClientInfo>, RelayError> {
        let room_id = room_id.to_string();
        self.request(|respond_to| Control::ListClients {
            room_id,
            respond_to,
        })
        .await
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomInfo>, RelayError> {
        self.request(|respond_to| Control::ListRooms { respond_to })
            .await
    }

    pub async fn room_stats(&self, room_id: &str) -> Result<Option<RoomStats>, RelayError> {
        let room_id = room_id.to_string();
        self.request(|respond_to| Control::RoomStats {
            room_id,
            respond_to,
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Control,
    ) -> Result<T, RelayError> {
        let (respond_to, response) = oneshot::channel();
        self.control_tx
            .send(build(respond_to))
            .await
            .map_err(|_| RelayError::HubClosed)?;
        response.await.map_err(|_| RelayError::HubClosed)
    }
}
