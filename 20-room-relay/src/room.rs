use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    client::{Client, ClientId, ClientKey, RoomId, SendFailure},
    message::ChatMessage,
};

/// Public view of a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: RoomId,
    #[serde(default)]
    pub name: String,
}

/// Public view of a room member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ClientInfo {
    pub id: ClientId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberStats {
    pub id: ClientId,
    pub username: String,
    pub dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomStats {
    pub id: RoomId,
    pub name: String,
    pub clients: Vec<MemberStats>,
}

struct Member {
    client: Client,
    dropped: u64,
}

/// The clients currently joined to one named room.
///
/// Membership is keyed by client id. Iteration order is whatever the map
/// yields; nothing depends on it.
pub struct Room {
    info: RoomInfo,
    members: HashMap<ClientId, Member>,
}

impl Room {
    pub fn new(info: RoomInfo) -> Self {
        Self {
            info,
            members: HashMap::new(),
        }
    }

    pub fn info(&self) -> &RoomInfo {
        &self.info
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// Adds a client unless its id is already taken. A rejected client is
    /// dropped here, closing its outbound queue.
    pub fn join(&mut self, client: Client) -> bool {
        if self.members.contains_key(client.id()) {
            return false;
        }
        self.members.insert(
            client.id().to_string(),
            Member {
                client,
                dropped: 0,
            },
        );
        true
    }

    /// Removes the member matching `key`. A member with the same id but a
    /// different connection serial is left alone.
    pub fn leave(&mut self, key: &ClientKey) -> Option<Client> {
        match self.members.get(&key.id) {
            Some(member) if member.client.key().serial == key.serial => {
                self.members.remove(&key.id).map(|member| member.client)
            }
            _ => None,
        }
    }

    /// Offers `message` to every member without waiting. Returns how many
    /// members accepted it.
    pub fn deliver(&mut self, message: &ChatMessage) -> usize {
        let mut delivered = 0;
        for (id, member) in self.members.iter_mut() {
            match member.client.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(SendFailure::Full) => {
                    member.dropped += 1;
                    warn!(
                        room = %self.info.id,
                        client = %id,
                        dropped = member.dropped,
                        "outbound queue full, dropping message"
                    );
                }
                Err(SendFailure::Closed) => {
                    debug!(room = %self.info.id, client = %id, "outbound queue already closed");
                }
            }
        }
        delivered
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.members
            .values()
            .map(|member| ClientInfo {
                id: member.client.id().to_string(),
                username: member.client.username().to_string(),
            })
            .collect()
    }

    pub fn stats(&self) -> RoomStats {
        RoomStats {
            id: self.info.id.clone(),
            name: self.info.name.clone(),
            clients: self
                .members
                .values()
                .map(|member| MemberStats {
                    id: member.client.id().to_string(),
                    username: member.client.username().to_string(),
                    dropped: member.dropped,
                })
                .collect(),
        }
    }
}
