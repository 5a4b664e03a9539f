//! Shared application state — the live-sessions map and the process-wide
//! collaborators each session handler needs.
//!
//! The live-sessions map's mutex is the single point of truth for session
//! lifecycle: a session is "live" exactly while it has an entry here.
//! Removing an entry is how a teardown path wins the race to own that
//! session's shutdown (see `ws_session::terminate`).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::dispatcher::IntegrationDispatcher;
use crate::encoder::EventEncoder;
use crate::route_selector::RouteSelector;
use crate::session::Session;
use crate::timeout::TimeoutController;

/// Everything the WebSocket handler and the management HTTP surface share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    pub dispatcher: Arc<IntegrationDispatcher>,
    pub encoder: Arc<EventEncoder>,
    pub route_selector: Arc<RouteSelector>,
    pub timeouts: TimeoutController,
    pub started_at_millis: i64,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let dispatcher = IntegrationDispatcher::new(config.integrations.clone());
        let encoder = EventEncoder::new(
            config.integration_mode,
            config.stage.clone(),
            config.api_id.clone(),
            config.domain_name.clone(),
        );
        let route_selector = RouteSelector::new(config.route_selection_expression.as_deref());

        Self {
            config: Arc::new(config),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            dispatcher: Arc::new(dispatcher),
            encoder: Arc::new(encoder),
            route_selector: Arc::new(route_selector),
            timeouts: TimeoutController::new(),
            started_at_millis: crate::time::now_millis(),
        }
    }

    /// Insert a newly admitted session. Called before the CONNECT event is
    /// dispatched, so a management push racing admission always finds the
    /// connection id once the handshake has completed.
    pub async fn insert_session(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.connection_id.clone(), session);
    }

    /// Remove a session from the live set. Returns the removed session if
    /// this call won the race (i.e. it was still present); `None` means
    /// someone else already tore it down or it never existed — the caller
    /// must treat that as "not my job to close this".
    pub async fn remove_session(&self, connection_id: &str) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(connection_id)
    }

    pub async fn get_session(&self, connection_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(connection_id).cloned()
    }

    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntegrationMode;
    use std::collections::HashMap as StdHashMap;

    fn test_config() -> Config {
        Config {
            port: 3001,
            stage: "dev".into(),
            api_id: "local".into(),
            domain_name: "localhost:3001".into(),
            integration_mode: IntegrationMode::LambdaProxy,
            route_selection_expression: None,
            integrations: StdHashMap::new(),
            idle_timeout_secs: 600,
            hard_timeout_secs: 7200,
            verbose: false,
        }
    }

    #[tokio::test]
    async fn remove_session_returns_none_when_already_removed() {
        let state = AppState::new(test_config());
        assert!(state.remove_session("nope").await.is_none());
    }

    #[tokio::test]
    async fn connection_count_starts_at_zero() {
        // Insert/remove under a live socket is covered end-to-end by the
        // WebSocket session tests; `Session` can't be built without one.
        let state = AppState::new(test_config());
        assert_eq!(state.connection_count().await, 0);
        assert!(state.get_session("missing").await.is_none());
    }
}
