//! `GET /health` — liveness probe, always 200.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::state::AppState;
use crate::time::now_millis;

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    connections: usize,
    uptime: i64,
}

pub async fn health(State(state): State<AppState>) -> Response {
    let connections = state.connection_count().await;
    let uptime = ((now_millis() - state.started_at_millis) / 1000).max(0);

    Json(HealthBody {
        status: "ok",
        connections,
        uptime,
    })
    .into_response()
}
