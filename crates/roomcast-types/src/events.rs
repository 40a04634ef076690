use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::SendMessageRequest;
use crate::models::Message;

const BROADCAST_PREFIX: &str = "room/";
const INBOUND_PREFIX: &str = "send/";

/// A channel path on the gateway.
///
/// `room/{id}` is the broadcast channel subscribers listen on, `send/{id}` is
/// the inbound channel clients submit messages to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Destination {
    Room(String),
    Send(String),
}

impl Destination {
    pub fn room(room_id: impl Into<String>) -> Self {
        Self::Room(room_id.into())
    }

    pub fn send(room_id: impl Into<String>) -> Self {
        Self::Send(room_id.into())
    }

    pub fn room_id(&self) -> &str {
        match self {
            Self::Room(id) | Self::Send(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    #[error("unknown destination prefix: {0}")]
    UnknownPrefix(String),
    #[error("invalid room id in destination: {0}")]
    InvalidRoomId(String),
}

impl FromStr for Destination {
    type Err = DestinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ctor, id): (fn(String) -> Self, &str) = if let Some(id) = s.strip_prefix(BROADCAST_PREFIX) {
            (Self::Room, id)
        } else if let Some(id) = s.strip_prefix(INBOUND_PREFIX) {
            (Self::Send, id)
        } else {
            return Err(DestinationError::UnknownPrefix(s.to_string()));
        };

        if id.is_empty() || id.contains('/') {
            return Err(DestinationError::InvalidRoomId(s.to_string()));
        }

        Ok(ctor(id.to_string()))
    }
}

impl TryFrom<String> for Destination {
    type Error = DestinationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Destination> for String {
    fn from(value: Destination) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room(id) => write!(f, "{}{}", BROADCAST_PREFIX, id),
            Self::Send(id) => write!(f, "{}{}", INBOUND_PREFIX, id),
        }
    }
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Sent once after the socket is upgraded
    Ready { session_id: String },

    /// A message was relayed to a room the client subscribes to
    Message {
        destination: Destination,
        payload: Message,
    },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Start receiving broadcasts for `room/{id}`
    Subscribe { destination: Destination },

    /// Stop receiving broadcasts for `room/{id}`
    Unsubscribe { destination: Destination },

    /// Submit a message on `send/{id}`
    Send {
        destination: Destination,
        payload: SendMessageRequest,
    },
}
