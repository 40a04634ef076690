use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use roomcast_db::Database;
use roomcast_types::api::SendMessageRequest;
use roomcast_types::models::Message;

use crate::dispatcher::Dispatcher;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Validates the target room, appends the message to its history, and hands
/// it to the dispatcher for broadcast.
#[derive(Clone)]
pub struct RoomRelay {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl RoomRelay {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Persist a submitted message and return it.
    ///
    /// The room is resolved from `req.room_id`, not from `route_room_id`;
    /// the route only names the broadcast channel. Nothing is written when
    /// the room does not exist.
    pub async fn relay_message(
        &self,
        route_room_id: &str,
        req: SendMessageRequest,
    ) -> Result<Message, RelayError> {
        if req.room_id != route_room_id {
            warn!(
                "Message routed to room '{}' but addressed to room '{}'",
                route_room_id, req.room_id
            );
        }

        let message = Message::new(req.sender, req.content);

        let db = self.db.clone();
        let room_id = req.room_id;
        let msg = message.clone();
        let (appended, room_id) = tokio::task::spawn_blocking(move || {
            let appended = db.append_message(&room_id, &msg.sender, &msg.content, &msg.time_stamp)?;
            Ok::<_, anyhow::Error>((appended, room_id))
        })
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

        if !appended {
            return Err(RelayError::RoomNotFound(room_id));
        }

        debug!("{} posted to room '{}'", message.sender, room_id);
        Ok(message)
    }

    /// Relay a message and publish it on `room/{route_room_id}`.
    /// Returns the stored message and the number of live receivers reached.
    pub async fn relay_and_broadcast(
        &self,
        route_room_id: &str,
        req: SendMessageRequest,
    ) -> Result<(Message, usize), RelayError> {
        let message = self.relay_message(route_room_id, req).await?;
        let reached = self.dispatcher.publish(route_room_id, &message);
        Ok((message, reached))
    }
}
