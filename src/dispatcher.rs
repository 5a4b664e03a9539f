//! Resolves a route key to a backend URI and performs the outbound POST.
//!
//! Never retries: a retry could duplicate a connect/disconnect event the
//! backend has already acted on. Imposes a bounded timeout so a slow
//! backend can't wedge client reaps.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use crate::encoder::{DisconnectInfo, EncodedPayload, EventEncoder, EventType};
use crate::session::SessionView;

const BACKEND_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted,
    Rejected { status: u16 },
    Unreachable { detail: String },
}

pub struct IntegrationDispatcher {
    client: Client,
    integrations: HashMap<String, String>,
}

impl IntegrationDispatcher {
    pub fn new(integrations: HashMap<String, String>) -> Self {
        let client = Client::builder()
            .timeout(BACKEND_REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client should build with a fixed timeout");
        Self {
            client,
            integrations,
        }
    }

    /// Dispatch one event. For connect/disconnect, an absent route key is an
    /// error. For message routing the Route Selector has already resolved to
    /// a key it believes exists; a missing `$default` is tolerated.
    pub async fn dispatch(
        &self,
        route_key: &str,
        event_type: EventType,
        encoder: &EventEncoder,
        session: &SessionView<'_>,
        body: Option<&str>,
        disconnect_info: Option<&DisconnectInfo>,
    ) -> DispatchOutcome {
        let Some(uri) = self.integrations.get(route_key) else {
            warn!(route_key, "no integration registered for route key");
            return DispatchOutcome::Unreachable {
                detail: format!("no integration registered for route key '{route_key}'"),
            };
        };

        let payload = encoder.encode(route_key, event_type, session, body, disconnect_info);
        self.send(uri, payload).await
    }

    async fn send(&self, uri: &str, payload: EncodedPayload) -> DispatchOutcome {
        let request = match payload {
            EncodedPayload::Json(value) => self
                .client
                .post(uri)
                .header("Content-Type", "application/json")
                .json(&value),
            EncodedPayload::Raw {
                body,
                headers,
                content_type,
            } => {
                let mut builder = self
                    .client
                    .post(uri)
                    .header("Content-Type", content_type)
                    .body(body);
                for (k, v) in headers {
                    builder = builder.header(k, v);
                }
                builder
            }
        };

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    DispatchOutcome::Accepted
                } else {
                    DispatchOutcome::Rejected {
                        status: status.as_u16(),
                    }
                }
            }
            Err(e) => DispatchOutcome::Unreachable {
                detail: e.to_string(),
            },
        }
    }
}
