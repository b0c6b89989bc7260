//! Per-connection tasks that move frames between a WebSocket and the hub.
//!
//! The write pump drains the client's outbound queue onto the socket and
//! ends when the hub closes that queue. The read pump turns every inbound
//! frame into a broadcast and ends on the first error or close.
//! [`serve_connection`] ties the two to the connection lifetime and is the
//! only place a client is unregistered.

use std::fmt::Display;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    client::ClientKey,
    hub::HubHandle,
    message::{ChatMessage, inbound_content},
};

pub async fn write_pump<S>(mut sink: S, mut outbound: mpsc::Receiver<ChatMessage>)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(message) = outbound.recv().await {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to encode outbound message");
                continue;
            }
        };
        if let Err(err) = sink.send(Message::Text(text)).await {
            debug!(error = %err, "write failed, stopping write pump");
            break;
        }
    }

    if let Err(err) = sink.close().await {
        debug!(error = %err, "failed to close connection cleanly");
    }
}

pub async fn read_pump<R, E>(mut stream: R, key: &ClientKey, hub: &HubHandle)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let content = match stream.next().await {
            Some(Ok(Message::Text(text))) => inbound_content(&text),
            Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                debug!(client = %key.id, ?frame, "client closed the connection");
                break;
            }
            Some(Err(err)) => {
                warn!(client = %key.id, error = %err, "connection closed unexpectedly");
                break;
            }
            None => {
                debug!(client = %key.id, "connection stream ended");
                break;
            }
        };

        let message = ChatMessage::new(content, key.username.clone(), key.room_id.clone());
        if hub.broadcast(message).await.is_err() {
            warn!(client = %key.id, "hub stopped, dropping connection");
            break;
        }
    }
}

/// Runs both pumps for one registered client until the connection ends,
/// then unregisters the client.
///
/// Whichever pump finishes first ends the read side. The write pump is then
/// allowed to finish once the hub has closed the outbound queue.
pub async fn serve_connection<S, R, E>(
    sink: S,
    stream: R,
    outbound: mpsc::Receiver<ChatMessage>,
    key: ClientKey,
    hub: HubHandle,
) where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut writer = tokio::spawn(write_pump(sink, outbound));

    let writer_done = tokio::select! {
        _ = read_pump(stream, &key, &hub) => false,
        _ = &mut writer => true,
    };

    let id = key.id.clone();
    if let Err(err) = hub.unregister(key).await {
        debug!(client = %id, error = %err, "unregister skipped");
    }

    if !writer_done {
        if let Err(err) = writer.await {
            warn!(client = %id, error = %err, "write pump panicked");
        }
    }
    debug!(client = %id, "connection torn down");
}
