use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, info};

use roomcast_types::api::{CreateRoomRequest, MessagePageQuery};
use roomcast_types::models::{Message, Room};

use crate::state::AppStateInner;

const MAX_PAGE_SIZE: u32 = 200;

type ApiResult<T> = Result<T, (StatusCode, &'static str)>;

fn internal(e: impl std::fmt::Display) -> (StatusCode, &'static str) {
    error!("Room query failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
}

/// POST /api/v1/rooms
pub async fn create_room(
    State(state): State<Arc<AppStateInner>>,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<impl IntoResponse> {
    let room_id = req.room_id.trim().to_string();
    if room_id.is_empty() || room_id.contains('/') {
        return Err((StatusCode::BAD_REQUEST, "Invalid room id"));
    }

    let room = Room {
        room_id,
        created_at: Utc::now(),
    };

    let db = state.db.clone();
    let new_room = room.clone();
    let created = tokio::task::spawn_blocking(move || db.create_room(&new_room.room_id, &new_room.created_at))
        .await
        .map_err(internal)?
        .map_err(internal)?;

    if !created {
        return Err((StatusCode::BAD_REQUEST, "Room already exists!"));
    }

    info!("Room '{}' created", room.room_id);
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /api/v1/rooms/{room_id}
pub async fn join_room(
    State(state): State<Arc<AppStateInner>>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<Room>> {
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || db.get_room(&room_id))
        .await
        .map_err(internal)?
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Room not found!!"))?;

    Ok(Json(row.into()))
}

/// GET /api/v1/rooms/{room_id}/messages?page=&size=
///
/// Page 0 holds the newest `size` messages; each page after reaches further
/// back. Messages inside a page are oldest first.
pub async fn get_messages(
    State(state): State<Arc<AppStateInner>>,
    Path(room_id): Path<String>,
    Query(query): Query<MessagePageQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let size = query.size.clamp(1, MAX_PAGE_SIZE);
    let skip = u64::from(query.page) * u64::from(size);

    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || {
        if db.get_room(&room_id)?.is_none() {
            return Ok(None);
        }
        db.get_messages(&room_id, size, skip).map(Some)
    })
    .await
    .map_err(internal)?
    .map_err(internal)?
    .ok_or((StatusCode::NOT_FOUND, "Room not found!!"))?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
