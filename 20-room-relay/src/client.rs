use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::message::ChatMessage;

pub type ClientId = String;
pub type RoomId = String;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Who a connection belongs to and where it sends from.
///
/// This is the part of a client the read pump and the unregister path need;
/// it carries no queue, so holding it never keeps a client's outbound queue
/// open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey {
    pub id: ClientId,
    pub username: String,
    pub room_id: RoomId,
    /// Distinguishes two connections that claim the same client id.
    pub serial: u64,
}

impl ClientKey {
    pub fn new(
        id: impl Into<ClientId>,
        username: impl Into<String>,
        room_id: impl Into<RoomId>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            room_id: room_id.into(),
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// A connected participant as the hub sees it: its identity plus the sending
/// half of its outbound queue.
///
/// The hub is the only holder of `outbound` once the client is registered.
/// Dropping the client closes the queue, which ends its write pump.
#[derive(Debug)]
pub struct Client {
    key: ClientKey,
    outbound: mpsc::Sender<ChatMessage>,
}

impl Client {
    pub fn new(key: ClientKey, outbound: mpsc::Sender<ChatMessage>) -> Self {
        Self { key, outbound }
    }

    /// Builds a client together with the receiving end of its outbound queue.
    /// A zero capacity is treated as one.
    pub fn channel(key: ClientKey, capacity: usize) -> (Self, mpsc::Receiver<ChatMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(key, tx), rx)
    }

    pub fn key(&self) -> &ClientKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn username(&self) -> &str {
        &self.key.username
    }

    pub fn room_id(&self) -> &str {
        &self.key.room_id
    }

    /// Queues a message without waiting for room in the queue.
    pub fn try_send(&self, message: ChatMessage) -> Result<(), SendFailure> {
        self.outbound.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SendFailure::Full,
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The client is not draining its queue fast enough.
    Full,
    /// The write pump has already gone away.
    Closed,
}
