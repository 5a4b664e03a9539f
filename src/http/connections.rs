//! `/@connections/{id}` — the management API backends use to push data to
//! a session or close it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::SinkExt;
use serde::Serialize;

use crate::http::response::gone;
use crate::state::AppState;
use crate::time::{format_iso8601_millis, now_millis};
use crate::ws_session::{reset_idle_timer, terminate};

/// `POST /@connections/{id}` — write `body` verbatim as a text frame and
/// bump `lastActivity` (resets idle, never hard).
pub async fn post_to_connection(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
    body: String,
) -> Response {
    let Some(session) = state.get_session(&connection_id).await else {
        return gone(&connection_id);
    };

    let send_result = {
        let mut sink = session.sink.lock().await;
        sink.send(axum::extract::ws::Message::Text(body)).await
    };
    if send_result.is_err() {
        return gone(&connection_id);
    }

    session.touch_activity(now_millis());
    reset_idle_timer(&state, &connection_id).await;

    StatusCode::OK.into_response()
}

#[derive(Debug, Serialize)]
struct ConnectionMeta {
    #[serde(rename = "connectionId")]
    connection_id: String,
    #[serde(rename = "connectedAt")]
    connected_at: String,
    #[serde(rename = "lastActiveAt")]
    last_active_at: String,
}

/// `GET /@connections/{id}` — metadata snapshot, ISO-8601 UTC timestamps.
pub async fn get_connection(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> Response {
    let Some(session) = state.get_session(&connection_id).await else {
        return gone(&connection_id);
    };

    Json(ConnectionMeta {
        connection_id: session.connection_id.clone(),
        connected_at: format_iso8601_millis(session.connected_at_millis),
        last_active_at: format_iso8601_millis(session.last_activity_millis()),
    })
    .into_response()
}

/// `DELETE /@connections/{id}` — close with code 1000, management reason.
pub async fn delete_connection(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> Response {
    if state.get_session(&connection_id).await.is_none() {
        return gone(&connection_id);
    }

    terminate(&state, &connection_id, 1000, "Closed by management API", true).await;
    StatusCode::NO_CONTENT.into_response()
}
