//! Shared JSON response helpers for the management HTTP surface.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct GoneBody<'a> {
    message: &'static str,
    #[serde(rename = "connectionId")]
    connection_id: &'a str,
}

/// Absent or already-closed sessions return 410 with this exact body.
pub fn gone(connection_id: &str) -> Response {
    (
        axum::http::StatusCode::GONE,
        Json(GoneBody {
            message: "Gone",
            connection_id,
        }),
    )
        .into_response()
}
