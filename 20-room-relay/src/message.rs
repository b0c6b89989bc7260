use serde::{Deserialize, Serialize};

/// A frame relayed to every member of a room.
///
/// The same shape travels in both directions once a client is connected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub content: String,
    pub username: String,
    pub room_id: String,
}

impl ChatMessage {
    pub fn new(
        content: impl Into<String>,
        username: impl Into<String>,
        room_id: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            username: username.into(),
            room_id: room_id.into(),
        }
    }

    pub fn joined(username: &str, room_id: &str) -> Self {
        Self::new(
            format!("New user are joining the room {room_id}"),
            username,
            room_id,
        )
    }

    pub fn left(client_id: &str, username: &str, room_id: &str) -> Self {
        Self::new(format!("user {client_id} left the chat"), username, room_id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// What a client may send. Only `content` is honoured; sender and room come
/// from the connection the frame arrived on.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    content: String,
}

/// Extracts the content of an inbound text frame.
///
/// Frames shaped like `{"content": "..."}` contribute that field, anything
/// else is relayed verbatim.
pub fn inbound_content(text: &str) -> String {
    match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) => frame.content,
        Err(_) => text.to_string(),
    }
}
