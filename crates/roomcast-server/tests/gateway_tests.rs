use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use roomcast_api::state::{AppState, AppStateInner};
use roomcast_db::Database;
use roomcast_gateway::Dispatcher;
use roomcast_server::config::Config;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Long enough for a command on one socket to land before another socket acts.
const SETTLE: Duration = Duration::from_millis(200);

async fn serve() -> (SocketAddr, AppState) {
    let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
    db.create_room("general", &Utc::now()).unwrap();
    db.create_room("random", &Utc::now()).unwrap();

    let state = AppStateInner::new(db, Dispatcher::new());
    let app = roomcast_server::app(state.clone(), &Config::default()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

/// Next text frame as JSON, or `None` if nothing arrives within `wait`.
async fn next_event(client: &mut Client, wait: Duration) -> Option<serde_json::Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let frame = tokio::time::timeout_at(deadline, client.next()).await.ok()??;
        if let Message::Text(text) = frame.unwrap() {
            return Some(serde_json::from_str(text.as_str()).unwrap());
        }
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (mut client, _) = connect_async(format!("ws://{addr}/chat")).await.unwrap();
    let ready = next_event(&mut client, Duration::from_secs(2))
        .await
        .expect("Ready frame");
    assert_eq!(ready["type"], "Ready");
    assert!(ready["data"]["session_id"].is_string());
    client
}

async fn command(client: &mut Client, json: serde_json::Value) {
    client.send(Message::text(json.to_string())).await.unwrap();
}

async fn subscribe(client: &mut Client, destination: &str) {
    command(
        client,
        serde_json::json!({ "type": "Subscribe", "data": { "destination": destination } }),
    )
    .await;
}

async fn send_to(client: &mut Client, destination: &str, room_id: &str, content: &str) {
    command(
        client,
        serde_json::json!({
            "type": "Send",
            "data": {
                "destination": destination,
                "payload": { "content": content, "sender": "bob", "roomId": room_id }
            }
        }),
    )
    .await;
}

#[tokio::test]
async fn broadcast_reaches_only_subscribers_of_that_room() {
    let (addr, state) = serve().await;
    let mut general = connect(addr).await;
    let mut random = connect(addr).await;

    subscribe(&mut general, "room/general").await;
    subscribe(&mut random, "room/random").await;
    tokio::time::sleep(SETTLE).await;
    assert_eq!(state.dispatcher().connection_count(), 2);

    // Garbage and a send to a missing room are dropped without closing the socket.
    random.send(Message::text("not json")).await.unwrap();
    send_to(&mut random, "send/ghost", "ghost", "lost").await;
    send_to(&mut random, "send/general", "general", "hello").await;

    let event = next_event(&mut general, Duration::from_secs(2))
        .await
        .expect("message on room/general");
    assert_eq!(event["type"], "Message");
    assert_eq!(event["data"]["destination"], "room/general");
    assert_eq!(event["data"]["payload"]["sender"], "bob");
    assert_eq!(event["data"]["payload"]["content"], "hello");
    assert!(event["data"]["payload"]["timeStamp"].is_string());

    assert!(next_event(&mut general, SETTLE).await.is_none());
    assert!(next_event(&mut random, SETTLE).await.is_none());

    assert_eq!(state.db.count_messages("general").unwrap(), 1);
    assert!(state.db.get_room("ghost").unwrap().is_none());
}

#[tokio::test]
async fn unsubscribed_room_stops_receiving() {
    let (addr, state) = serve().await;
    let mut client = connect(addr).await;

    subscribe(&mut client, "room/general").await;
    command(
        &mut client,
        serde_json::json!({ "type": "Unsubscribe", "data": { "destination": "room/general" } }),
    )
    .await;
    send_to(&mut client, "send/general", "general", "quiet").await;

    assert!(next_event(&mut client, SETTLE).await.is_none());
    assert_eq!(state.db.count_messages("general").unwrap(), 1);
}

#[tokio::test]
async fn closing_the_socket_releases_the_connection() {
    let (addr, state) = serve().await;
    let mut client = connect(addr).await;
    tokio::time::sleep(SETTLE).await;
    assert_eq!(state.dispatcher().connection_count(), 1);

    client.close(None).await.unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(state.dispatcher().connection_count(), 0);
}
