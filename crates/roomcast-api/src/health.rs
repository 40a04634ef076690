use std::sync::Arc;

use axum::{Json, extract::State};

use roomcast_types::api::HealthResponse;

use crate::state::AppStateInner;

/// GET /health
pub async fn health(State(state): State<Arc<AppStateInner>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        connections: state.dispatcher().connection_count(),
    })
}
