//! WebSocket admission, frame loop, and the centralized teardown path.
//!
//! `terminate` is the single place a session leaves the live set. Whichever
//! caller's `AppState::remove_session` call actually finds and removes the
//! entry owns that session's close frame and (conditionally) its
//! `DISCONNECT` dispatch; every other caller racing the same connection id
//! gets `None` back and does nothing further.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::dispatcher::DispatchOutcome;
use crate::encoder::{DisconnectInfo, EventType};
use crate::ids::generate_connection_id;
use crate::session::{Headers, QueryParams, Session};
use crate::state::AppState;
use crate::time::now_millis;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let query_params = parse_query_params(uri.query().unwrap_or(""));
    let captured_headers = capture_headers(&headers);
    let source_ip = normalize_source_ip(addr.ip());
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned();

    ws.on_upgrade(move |socket| {
        admit(socket, state, query_params, captured_headers, source_ip, user_agent)
    })
}

async fn admit(
    socket: WebSocket,
    state: AppState,
    query_params: QueryParams,
    headers: Headers,
    source_ip: IpAddr,
    user_agent: String,
) {
    let connection_id = generate_connection_id();
    let (sink, stream) = socket.split();
    let sink = Arc::new(Mutex::new(sink));
    let connected_at = now_millis();

    let session = Arc::new(Session::new(
        connection_id.clone(),
        sink,
        connected_at,
        query_params,
        headers,
        source_ip,
        user_agent,
    ));

    // Inserted before the CONNECT dispatch so a management push racing
    // admission always finds the connection once the handshake completes.
    state.insert_session(session.clone()).await;

    let outcome = state
        .dispatcher
        .dispatch(
            "$connect",
            EventType::Connect,
            &state.encoder,
            &session.view(),
            None,
            None,
        )
        .await;

    match outcome {
        DispatchOutcome::Accepted => {
            info!(connection_id = %connection_id, %source_ip, "session admitted");
        }
        DispatchOutcome::Rejected { status } => {
            warn!(connection_id = %connection_id, status, "backend rejected $connect");
            terminate(&state, &connection_id, 1011, "Backend connect failed", false).await;
            return;
        }
        DispatchOutcome::Unreachable { detail } => {
            warn!(connection_id = %connection_id, detail, "backend unreachable for $connect");
            terminate(&state, &connection_id, 1011, "Backend connect failed", false).await;
            return;
        }
    }

    start_hard_timer(&state, &connection_id).await;
    reset_idle_timer(&state, &connection_id).await;

    read_loop(stream, state, connection_id).await;
}

async fn read_loop(mut stream: SplitStream<WebSocket>, state: AppState, connection_id: String) {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_inbound_message(&state, &connection_id, text).await;
            }
            Some(Ok(Message::Binary(bytes))) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                handle_inbound_message(&state, &connection_id, text).await;
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame
                    .map(|f| (f.code, f.reason.to_string()))
                    .unwrap_or((1000, String::new()));
                terminate(&state, &connection_id, code, &reason, true).await;
                return;
            }
            Some(Err(e)) => {
                warn!(connection_id = %connection_id, error = %e, "client socket error");
                terminate(&state, &connection_id, 1006, "Client socket error", true).await;
                return;
            }
            None => {
                terminate(&state, &connection_id, 1006, "Connection lost", true).await;
                return;
            }
        }
    }
}

async fn handle_inbound_message(state: &AppState, connection_id: &str, text: String) {
    let Some(session) = state.get_session(connection_id).await else {
        return;
    };
    session.touch_activity(now_millis());
    reset_idle_timer(state, connection_id).await;

    let route_key = state.route_selector.select(&text, &state.config.integrations);
    let outcome = state
        .dispatcher
        .dispatch(
            &route_key,
            EventType::Message,
            &state.encoder,
            &session.view(),
            Some(&text),
            None,
        )
        .await;
    if let DispatchOutcome::Unreachable { detail } = outcome {
        warn!(connection_id, route_key, detail, "message dispatch unreachable");
    }
}

/// The sole teardown path. Removes the session from the live set; if that
/// succeeds, cancels its timers, writes the close frame, and — unless the
/// caller says otherwise (connect rejected/unreachable) — dispatches
/// `DISCONNECT`. A `None` removal means another path already tore this
/// session down; this call is then a no-op.
pub(crate) async fn terminate(
    state: &AppState,
    connection_id: &str,
    close_code: u16,
    reason: &str,
    dispatch_disconnect: bool,
) {
    let Some(session) = state.remove_session(connection_id).await else {
        return;
    };
    state.timeouts.cancel(connection_id).await;
    send_close(&session, close_code, reason).await;

    if dispatch_disconnect {
        let info = DisconnectInfo {
            status_code: close_code,
            reason: reason.to_owned(),
        };
        let outcome = state
            .dispatcher
            .dispatch(
                "$disconnect",
                EventType::Disconnect,
                &state.encoder,
                &session.view(),
                None,
                Some(&info),
            )
            .await;
        if !matches!(outcome, DispatchOutcome::Accepted) {
            warn!(connection_id, ?outcome, "disconnect dispatch did not succeed");
        }
    }
}

async fn send_close(session: &Session, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_owned().into(),
    };
    let mut sink = session.sink.lock().await;
    let _ = sink.send(Message::Close(Some(frame))).await;
}

pub(crate) async fn start_hard_timer(state: &AppState, connection_id: &str) {
    let duration = Duration::from_secs(state.config.hard_timeout_secs);
    let state = state.clone();
    let connection_id_owned = connection_id.to_owned();
    state
        .timeouts
        .start_hard(connection_id, duration, move || {
            tokio::spawn(async move {
                terminate(&state, &connection_id_owned, 1001, "Hard timeout", true).await;
            })
        })
        .await;
}

pub(crate) async fn reset_idle_timer(state: &AppState, connection_id: &str) {
    let duration = Duration::from_secs(state.config.idle_timeout_secs);
    let state_clone = state.clone();
    let connection_id_owned = connection_id.to_owned();
    state
        .timeouts
        .reset_idle(connection_id, duration, move || {
            tokio::spawn(async move {
                terminate(&state_clone, &connection_id_owned, 1001, "Idle timeout", true).await;
            })
        })
        .await;
}

fn normalize_source_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        other => other,
    }
}

fn parse_query_params(query: &str) -> QueryParams {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn capture_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .map(|(k, v)| (k.as_str().to_owned(), v.to_str().unwrap_or("").to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn ipv4_mapped_ipv6_normalizes_to_ipv4() {
        let mapped = Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0xc000, 0x0201);
        let normalized = normalize_source_ip(IpAddr::V6(mapped));
        assert_eq!(normalized, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    }

    #[test]
    fn plain_ipv4_is_unchanged() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(normalize_source_ip(ip), ip);
    }

    #[test]
    fn parse_query_params_preserves_order_and_duplicates() {
        let parsed = parse_query_params("id=1&token=abc&id=2");
        assert_eq!(
            parsed,
            vec![
                ("id".to_owned(), "1".to_owned()),
                ("token".to_owned(), "abc".to_owned()),
                ("id".to_owned(), "2".to_owned()),
            ]
        );
    }

    #[test]
    fn parse_query_params_empty_string_yields_empty_vec() {
        assert!(parse_query_params("").is_empty());
    }
}
