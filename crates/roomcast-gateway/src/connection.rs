use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, trace, warn};
use uuid::Uuid;

use roomcast_types::events::{Destination, GatewayCommand, GatewayEvent};

use crate::relay::{RelayError, RoomRelay};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Rooms a single connection receives broadcasts for.
type Subscriptions = Arc<RwLock<HashSet<String>>>;

/// Serve one WebSocket client until it disconnects or stops answering pings.
pub async fn handle_connection(socket: WebSocket, relay: RoomRelay) {
    let (mut sender, mut receiver) = socket.split();
    let session_id = Uuid::new_v4().to_string();

    let ready = GatewayEvent::Ready {
        session_id: session_id.clone(),
    };
    let ready = match serde_json::to_string(&ready) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to encode Ready for session {}: {}", session_id, e);
            return;
        }
    };
    if sender.send(WsMessage::Text(ready.into())).await.is_err() {
        return;
    }

    let dispatcher = relay.dispatcher().clone();
    dispatcher.connection_opened();
    info!("Session {} connected to gateway", session_id);

    let mut broadcast_rx = dispatcher.subscribe();
    let subscriptions: Subscriptions = Arc::new(RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward subscribed broadcasts -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if !is_subscribed(&send_subscriptions, &event.room_id) {
                        continue;
                    }

                    if sender.send(WsMessage::Text(event.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_session = session_id.clone();
    let recv_subscriptions = subscriptions.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                WsMessage::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&relay, &recv_session, &recv_subscriptions, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "Session {} bad command: {} -- raw: {}",
                            recv_session,
                            e,
                            truncate(&text, 200)
                        );
                    }
                },
                WsMessage::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.connection_closed();
    info!("Session {} disconnected from gateway", session_id);
}

async fn handle_command(
    relay: &RoomRelay,
    session_id: &str,
    subscriptions: &Subscriptions,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::Subscribe {
            destination: Destination::Room(room_id),
        } => {
            info!("Session {} subscribed to room/{}", session_id, room_id);
            write_subscriptions(subscriptions).insert(room_id);
        }

        GatewayCommand::Unsubscribe {
            destination: Destination::Room(room_id),
        } => {
            info!("Session {} unsubscribed from room/{}", session_id, room_id);
            write_subscriptions(subscriptions).remove(&room_id);
        }

        GatewayCommand::Send {
            destination: Destination::Send(route_room_id),
            payload,
        } => {
            trace!("Session {} sending to send/{}", session_id, route_room_id);
            match relay.relay_and_broadcast(&route_room_id, payload).await {
                Ok((_, reached)) => {
                    trace!("Broadcast on room/{} reached {} receivers", route_room_id, reached);
                }
                Err(RelayError::RoomNotFound(room_id)) => {
                    warn!(
                        "Session {} sent to unknown room '{}', message dropped",
                        session_id, room_id
                    );
                }
                Err(e) => {
                    warn!("Session {} relay to send/{} failed: {}", session_id, route_room_id, e);
                }
            }
        }

        other => {
            warn!("Session {} used wrong channel kind: {:?}", session_id, other);
        }
    }
}

fn is_subscribed(subscriptions: &Subscriptions, room_id: &str) -> bool {
    subscriptions
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .contains(room_id)
}

fn write_subscriptions(subscriptions: &Subscriptions) -> std::sync::RwLockWriteGuard<'_, HashSet<String>> {
    subscriptions
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use roomcast_db::Database;
    use roomcast_types::api::SendMessageRequest;
    use tokio::sync::broadcast::error::TryRecvError;

    use crate::dispatcher::Dispatcher;

    fn setup() -> (RoomRelay, Arc<Database>, Subscriptions) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.create_room("general", &Utc::now()).unwrap();
        let relay = RoomRelay::new(db.clone(), Dispatcher::new());
        (relay, db, Arc::new(RwLock::new(HashSet::new())))
    }

    fn send(route: &str, room_id: &str) -> GatewayCommand {
        GatewayCommand::Send {
            destination: Destination::send(route),
            payload: SendMessageRequest {
                content: "hi".into(),
                sender: "alice".into(),
                room_id: room_id.into(),
            },
        }
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe_track_rooms() {
        let (relay, _, subs) = setup();

        let cmd = GatewayCommand::Subscribe { destination: Destination::room("general") };
        handle_command(&relay, "s1", &subs, cmd).await;
        assert!(is_subscribed(&subs, "general"));
        assert!(!is_subscribed(&subs, "random"));

        let cmd = GatewayCommand::Unsubscribe { destination: Destination::room("general") };
        handle_command(&relay, "s1", &subs, cmd).await;
        assert!(!is_subscribed(&subs, "general"));
    }

    #[tokio::test]
    async fn subscribing_to_an_inbound_channel_is_ignored() {
        let (relay, _, subs) = setup();

        let cmd = GatewayCommand::Subscribe { destination: Destination::send("general") };
        handle_command(&relay, "s1", &subs, cmd).await;
        assert!(subs.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_command_relays_and_broadcasts() {
        let (relay, db, subs) = setup();
        let mut rx = relay.dispatcher().subscribe();

        handle_command(&relay, "s1", &subs, send("general", "general")).await;

        assert_eq!(db.count_messages("general").unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap().room_id, "general");
    }

    #[tokio::test]
    async fn send_to_unknown_room_is_dropped() {
        let (relay, db, subs) = setup();
        let mut rx = relay.dispatcher().subscribe();

        handle_command(&relay, "s1", &subs, send("ghost", "ghost")).await;

        assert_eq!(db.count_messages("ghost").unwrap(), 0);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn send_on_broadcast_channel_is_ignored() {
        let (relay, db, subs) = setup();
        let cmd = GatewayCommand::Send {
            destination: Destination::room("general"),
            payload: SendMessageRequest {
                content: "hi".into(),
                sender: "alice".into(),
                room_id: "general".into(),
            },
        };

        handle_command(&relay, "s1", &subs, cmd).await;
        assert_eq!(db.count_messages("general").unwrap(), 0);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 200), "hi");
    }
}
