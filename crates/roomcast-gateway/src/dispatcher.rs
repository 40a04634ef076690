use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tracing::error;

use roomcast_types::events::{Destination, GatewayEvent};
use roomcast_types::models::Message;

const DEFAULT_CAPACITY: usize = 1024;

/// A serialized broadcast, tagged with the room it belongs to so each
/// connection can drop events for rooms it does not subscribe to.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub room_id: String,
    pub json: Arc<str>,
}

/// Fans room broadcasts out to every connected client.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// All connections receive every event and filter by room themselves
    broadcast_tx: broadcast::Sender<RoomEvent>,

    /// Live WebSocket connections
    connections: AtomicUsize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` is how many events a slow receiver may fall behind before
    /// it starts losing them.
    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to room events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish a message on `room/{room_id}`. Returns how many receivers
    /// were live at the time of sending.
    pub fn publish(&self, room_id: &str, message: &Message) -> usize {
        let event = GatewayEvent::Message {
            destination: Destination::room(room_id),
            payload: message.clone(),
        };

        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize broadcast for room {}: {}", room_id, e);
                return 0;
            }
        };

        self.inner
            .broadcast_tx
            .send(RoomEvent {
                room_id: room_id.to_string(),
                json: json.into(),
            })
            .unwrap_or(0)
    }

    pub fn connection_opened(&self) {
        self.inner.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.inner.connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.load(Ordering::Relaxed)
    }
}
