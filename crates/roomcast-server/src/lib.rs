pub mod config;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use roomcast_api::state::AppState;
use roomcast_api::{files, health, rooms};
use roomcast_gateway::connection;

use crate::config::{AllowedOrigins, Config};

/// Build the full HTTP + WebSocket router.
pub fn app(state: AppState, config: &Config) -> Result<Router> {
    let room_routes = Router::new()
        .route("/api/v1/rooms", post(rooms::create_room))
        .route("/api/v1/rooms/{room_id}", get(rooms::join_room))
        .route("/api/v1/rooms/{room_id}/messages", get(rooms::get_messages));

    let file_routes = Router::new()
        .route("/api/files/upload", post(files::upload_file))
        .route("/api/files/{id}", get(files::download_file))
        .route("/api/files/metadata/{id}", get(files::file_metadata))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes));

    let app = Router::new()
        .merge(room_routes)
        .merge(file_routes)
        .route("/chat", get(ws_upgrade))
        .route("/health", get(health::health))
        .layer(cors_layer(&config.allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Bind the configured address. `host` may be a hostname or an IP literal.
pub async fn bind(config: &Config) -> Result<TcpListener> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))
}

fn cors_layer(origins: &AllowedOrigins) -> Result<CorsLayer> {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(list) => {
            let values = list
                .iter()
                .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{}'", o)))
                .collect::<Result<Vec<_>>>()?;
            AllowOrigin::list(values)
        }
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any))
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, relay))
}
