//! Session data model.
//!
//! A `Session` is created on WebSocket upgrade completion and removed from
//! the live set exactly once, by whichever path wins the race to take it
//! out of `state::AppState`'s live-sessions map (see `state.rs`).

use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use tokio::sync::Mutex;

/// Ordered (name, value) pairs as observed on the connect-time query string.
/// Duplicates are preserved here; only the *last* value per name is exposed
/// to the backend.
pub type QueryParams = Vec<(String, String)>;

/// Connect-time request headers, names lowercased, first value wins.
pub type Headers = Vec<(String, String)>;

pub type SocketSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

pub struct Session {
    pub connection_id: String,
    pub sink: SocketSink,
    pub connected_at_millis: i64,
    last_activity_millis: AtomicI64,
    pub query_params: QueryParams,
    pub headers: Headers,
    pub source_ip: IpAddr,
    pub user_agent: String,
}

impl Session {
    pub fn new(
        connection_id: String,
        sink: SocketSink,
        connected_at_millis: i64,
        query_params: QueryParams,
        headers: Headers,
        source_ip: IpAddr,
        user_agent: String,
    ) -> Self {
        Self {
            connection_id,
            sink,
            connected_at_millis,
            last_activity_millis: AtomicI64::new(connected_at_millis),
            query_params,
            headers,
            source_ip,
            user_agent,
        }
    }

    /// Last observed activity: inbound frame, or successful management push.
    pub fn last_activity_millis(&self) -> i64 {
        self.last_activity_millis.load(Ordering::SeqCst)
    }

    /// Bump `lastActivity` to `now`, enforcing monotonicity.
    pub fn touch_activity(&self, now_millis: i64) {
        bump_monotonic(&self.last_activity_millis, now_millis);
    }

    /// Last value per query parameter name, as exposed to the backend.
    pub fn query_params_last_value(&self) -> Vec<(String, String)> {
        last_value_per_key(&self.query_params)
    }

    /// Single-valued headers, as exposed to the backend (first value wins).
    pub fn headers_single_value(&self) -> Vec<(String, String)> {
        first_value_per_key(&self.headers)
    }

    pub fn user_agent_opt(&self) -> Option<&str> {
        if self.user_agent.is_empty() {
            None
        } else {
            Some(&self.user_agent)
        }
    }

    /// A socket-free snapshot of this session's metadata, for the Event
    /// Encoder and Integration Dispatcher — neither needs to touch the
    /// socket handle, so they never get ownership-adjacent access to it.
    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            connection_id: &self.connection_id,
            connected_at_millis: self.connected_at_millis,
            query_params: &self.query_params,
            headers: &self.headers,
            source_ip: self.source_ip,
            user_agent: &self.user_agent,
        }
    }
}

pub struct SessionView<'a> {
    pub connection_id: &'a str,
    pub connected_at_millis: i64,
    query_params: &'a [(String, String)],
    headers: &'a [(String, String)],
    pub source_ip: IpAddr,
    user_agent: &'a str,
}

impl<'a> SessionView<'a> {
    pub fn query_params_last_value(&self) -> Vec<(String, String)> {
        last_value_per_key(self.query_params)
    }

    pub fn headers_single_value(&self) -> Vec<(String, String)> {
        first_value_per_key(self.headers)
    }

    pub fn user_agent_opt(&self) -> Option<&str> {
        if self.user_agent.is_empty() {
            None
        } else {
            Some(self.user_agent)
        }
    }
}

/// Advance `atomic` to `candidate` only if `candidate` is strictly greater.
fn bump_monotonic(atomic: &AtomicI64, candidate: i64) {
    let mut prev = atomic.load(Ordering::SeqCst);
    while candidate > prev {
        match atomic.compare_exchange_weak(prev, candidate, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => break,
            Err(actual) => prev = actual,
        }
    }
}

fn last_value_per_key(pairs: &[(String, String)]) -> Vec<(String, String)> {
    let mut order: Vec<String> = Vec::new();
    let mut values: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    for (k, v) in pairs {
        if !values.contains_key(k) {
            order.push(k.clone());
        }
        values.insert(k.clone(), v.clone());
    }
    order
        .into_iter()
        .map(|k| {
            let v = values.remove(&k).unwrap_or_default();
            (k, v)
        })
        .collect()
}

fn first_value_per_key(pairs: &[(String, String)]) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (k, v) in pairs {
        if seen.insert(k.clone()) {
            out.push((k.clone(), v.clone()));
        }
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_per_key_keeps_last_occurrence_in_first_seen_order() {
        let pairs = vec![
            ("id".to_owned(), "1".to_owned()),
            ("token".to_owned(), "abc".to_owned()),
            ("id".to_owned(), "2".to_owned()),
        ];
        let resolved = last_value_per_key(&pairs);
        assert_eq!(
            resolved,
            vec![
                ("id".to_owned(), "2".to_owned()),
                ("token".to_owned(), "abc".to_owned()),
            ]
        );
    }

    #[test]
    fn first_value_per_key_keeps_first_occurrence() {
        let pairs = vec![
            ("host".to_owned(), "a".to_owned()),
            ("host".to_owned(), "b".to_owned()),
        ];
        let resolved = first_value_per_key(&pairs);
        assert_eq!(resolved, vec![("host".to_owned(), "a".to_owned())]);
    }

    #[test]
    fn bump_monotonic_never_moves_backwards() {
        let atomic = AtomicI64::new(100);
        bump_monotonic(&atomic, 50);
        assert_eq!(atomic.load(Ordering::SeqCst), 100);
        bump_monotonic(&atomic, 150);
        assert_eq!(atomic.load(Ordering::SeqCst), 150);
        bump_monotonic(&atomic, 150);
        assert_eq!(atomic.load(Ordering::SeqCst), 150);
    }
}
