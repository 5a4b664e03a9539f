//! Builds the lambda-proxy-shaped event payload sent to a backend integration.
//!
//! Shapes the payload dispatched to a backend integration for a single
//! session event. Two modes, selected by `config::IntegrationMode`.

use serde_json::{json, Map, Value};

use crate::config::IntegrationMode;
use crate::ids::generate_request_id;
use crate::session::SessionView;
use crate::time::format_request_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Connect,
    Disconnect,
    Message,
}

impl EventType {
    fn as_str(self) -> &'static str {
        match self {
            EventType::Connect => "CONNECT",
            EventType::Disconnect => "DISCONNECT",
            EventType::Message => "MESSAGE",
        }
    }
}

/// Close-frame details carried on a `DISCONNECT` event.
#[derive(Debug, Clone)]
pub struct DisconnectInfo {
    pub status_code: u16,
    pub reason: String,
}

/// What actually goes out over the wire to the backend.
pub enum EncodedPayload {
    /// lambda-proxy mode: a single JSON body, `Content-Type: application/json`.
    Json(Value),
    /// http-headers mode: a raw body plus headers to attach to the request.
    Raw {
        body: String,
        headers: Vec<(String, String)>,
        content_type: &'static str,
    },
}

pub struct EventEncoder {
    mode: IntegrationMode,
    stage: String,
    api_id: String,
    domain_name: String,
}

impl EventEncoder {
    pub fn new(mode: IntegrationMode, stage: String, api_id: String, domain_name: String) -> Self {
        Self {
            mode,
            stage,
            api_id,
            domain_name,
        }
    }

    pub fn encode(
        &self,
        route_key: &str,
        event_type: EventType,
        session: &SessionView<'_>,
        body: Option<&str>,
        disconnect_info: Option<&DisconnectInfo>,
    ) -> EncodedPayload {
        match self.mode {
            IntegrationMode::LambdaProxy => EncodedPayload::Json(
                self.encode_lambda_proxy(route_key, event_type, session, body, disconnect_info),
            ),
            IntegrationMode::HttpHeaders => {
                self.encode_http_headers(route_key, event_type, session, body, disconnect_info)
            }
        }
    }

    fn encode_lambda_proxy(
        &self,
        route_key: &str,
        event_type: EventType,
        session: &SessionView<'_>,
        body: Option<&str>,
        disconnect_info: Option<&DisconnectInfo>,
    ) -> Value {
        let now = crate::time::now_millis();
        let request_id = generate_request_id();

        let mut request_context = Map::new();
        request_context.insert("routeKey".into(), json!(route_key));
        request_context.insert("eventType".into(), json!(event_type.as_str()));
        request_context.insert("extendedRequestId".into(), json!(request_id));
        request_context.insert("requestId".into(), json!(request_id));
        request_context.insert("requestTime".into(), json!(format_request_time(now)));
        request_context.insert("messageDirection".into(), json!("IN"));
        request_context.insert("stage".into(), json!(self.stage));
        request_context.insert("connectedAt".into(), json!(session.connected_at_millis));
        request_context.insert("requestTimeEpoch".into(), json!(now));

        let mut identity = Map::new();
        identity.insert("sourceIp".into(), json!(session.source_ip.to_string()));
        if let Some(ua) = session.user_agent_opt() {
            identity.insert("userAgent".into(), json!(ua));
        }
        request_context.insert("identity".into(), Value::Object(identity));

        request_context.insert("domainName".into(), json!(self.domain_name));
        request_context.insert("connectionId".into(), json!(session.connection_id));
        request_context.insert("apiId".into(), json!(self.api_id));

        if matches!(event_type, EventType::Message) {
            request_context.insert("messageId".into(), json!(generate_request_id()));
        }
        if let Some(info) = disconnect_info {
            request_context.insert("disconnectStatusCode".into(), json!(info.status_code));
            request_context.insert("disconnectReason".into(), json!(info.reason));
        }

        let headers = session.headers_single_value();
        let mut headers_obj = Map::new();
        let mut multi_headers_obj = Map::new();
        for (k, v) in &headers {
            headers_obj.insert(k.clone(), json!(v));
            multi_headers_obj.insert(k.clone(), json!([v]));
        }

        let query_params = session.query_params_last_value();
        let query_string_parameters = if query_params.is_empty() {
            Value::Null
        } else {
            let mut obj = Map::new();
            for (k, v) in &query_params {
                obj.insert(k.clone(), json!(v));
            }
            Value::Object(obj)
        };

        let body_value = match event_type {
            EventType::Message => body.map(|b| json!(b)).unwrap_or(Value::Null),
            EventType::Connect | EventType::Disconnect => Value::Null,
        };

        json!({
            "requestContext": Value::Object(request_context),
            "headers": Value::Object(headers_obj),
            "multiValueHeaders": Value::Object(multi_headers_obj),
            "queryStringParameters": query_string_parameters,
            "body": body_value,
            "isBase64Encoded": false,
        })
    }

    fn encode_http_headers(
        &self,
        route_key: &str,
        event_type: EventType,
        session: &SessionView<'_>,
        body: Option<&str>,
        disconnect_info: Option<&DisconnectInfo>,
    ) -> EncodedPayload {
        let mut headers = session.headers_single_value();
        headers.push(("connectionId".to_owned(), session.connection_id.to_owned()));
        headers.push(("x-event-type".to_owned(), event_type.as_str().to_owned()));
        headers.push(("x-route-key".to_owned(), route_key.to_owned()));
        if let Some(info) = disconnect_info {
            headers.push((
                "x-disconnect-status-code".to_owned(),
                info.status_code.to_string(),
            ));
            headers.push(("x-disconnect-reason".to_owned(), info.reason.clone()));
        }

        let body = match event_type {
            EventType::Message => body.unwrap_or_default().to_owned(),
            EventType::Connect | EventType::Disconnect => String::new(),
        };

        EncodedPayload::Raw {
            body,
            headers,
            content_type: "text/plain",
        }
    }
}
