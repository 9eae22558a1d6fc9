use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Per-session legacy correlation key.
pub type MessageId = u64;

/// Request emitted by this context toward the parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    /// Monotonic per-session id.
    pub id: MessageId,
    /// Process-unique identifier used for telemetry correlation.
    pub uuid: Uuid,
    /// Action name.
    pub func: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Telemetry tag naming the calling API and its version.
    pub api_version_tag: String,
    /// Set when this request relays an unhandled child request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_proxied_from_child: Option<bool>,
}

impl MessageRequest {
    /// Build a request stamped with the current time.
    pub fn new(
        id: MessageId,
        uuid: Uuid,
        func: impl Into<String>,
        args: Vec<Value>,
        api_version_tag: impl Into<String>,
    ) -> Self {
        Self {
            id,
            uuid,
            func: func.into(),
            timestamp: now_millis(),
            args,
            api_version_tag: api_version_tag.into(),
            is_proxied_from_child: None,
        }
    }

    /// Tag this request as relayed from a child window.
    pub fn proxied_from_child(mut self) -> Self {
        self.is_proxied_from_child = Some(true);
        self
    }
}

/// Response to a request, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    /// Id of the request being answered.
    pub id: MessageId,
    /// Uuid of the request being answered, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    /// Positional results.
    #[serde(default)]
    pub args: Vec<Value>,
    /// `Some(true)` when more responses for the same id will follow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_partial_response: Option<bool>,
}

impl MessageResponse {
    /// Build a response.
    pub fn new(
        id: MessageId,
        uuid: Option<Uuid>,
        args: Vec<Value>,
        is_partial_response: Option<bool>,
    ) -> Self {
        Self {
            id,
            uuid,
            args,
            is_partial_response,
        }
    }

    /// True only for an explicit `isPartialResponse: true`.
    pub fn is_partial(&self) -> bool {
        self.is_partial_response == Some(true)
    }
}

/// Id-less notification forwarded down to a child window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageEvent {
    pub func: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl MessageEvent {
    pub fn new(func: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            func: func.into(),
            args,
        }
    }
}

/// Request-shaped message arriving from another window.
///
/// Older hosts and children omit `uuid`, `timestamp` and `apiVersionTag`,
/// and host-initiated notifications may omit `id`, so every field except
/// `func` is optional here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    #[serde(default)]
    pub id: Option<MessageId>,
    #[serde(default)]
    pub uuid: Option<Uuid>,
    pub func: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub api_version_tag: Option<String>,
}

/// Anything this context posts to another window.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Request(MessageRequest),
    Response(MessageResponse),
    Event(MessageEvent),
}

impl Outbound {
    /// Convert into the JSON value handed to the window.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            Outbound::Request(request) => serde_json::to_value(request),
            Outbound::Response(response) => serde_json::to_value(response),
            Outbound::Event(event) => serde_json::to_value(event),
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Outbound::Request(request) => {
                format!("request {} ({}) func={}", request.id, request.uuid, request.func)
            }
            Outbound::Response(response) => format!("response {}", response.id),
            Outbound::Event(event) => format!("event func={}", event.func),
        }
    }
}

impl From<MessageRequest> for Outbound {
    fn from(value: MessageRequest) -> Self {
        Outbound::Request(value)
    }
}

impl From<MessageResponse> for Outbound {
    fn from(value: MessageResponse) -> Self {
        Outbound::Response(value)
    }
}

impl From<MessageEvent> for Outbound {
    fn from(value: MessageEvent) -> Self {
        Outbound::Event(value)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serializes_camel_case() {
        let uuid = Uuid::new_v4();
        let request = MessageRequest::new(7, uuid, "foo", vec![json!(1), json!(2)], "v2_foo");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["id"], json!(7));
        assert_eq!(value["uuid"], json!(uuid.to_string()));
        assert_eq!(value["func"], json!("foo"));
        assert_eq!(value["args"], json!([1, 2]));
        assert_eq!(value["apiVersionTag"], json!("v2_foo"));
        assert!(value["timestamp"].as_u64().unwrap() > 0);
        assert!(value.get("isProxiedFromChild").is_none());
    }

    #[test]
    fn proxied_request_carries_flag() {
        let request = MessageRequest::new(0, Uuid::new_v4(), "foo", vec![], "v2_tasks.startTask")
            .proxied_from_child();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["isProxiedFromChild"], json!(true));
    }

    #[test]
    fn response_partial_flag_defaults_to_terminal() {
        let response: MessageResponse = serde_json::from_value(json!({"id": 3})).unwrap();
        assert!(!response.is_partial());
        assert!(response.args.is_empty());

        let response: MessageResponse =
            serde_json::from_value(json!({"id": 3, "args": [], "isPartialResponse": false}))
                .unwrap();
        assert!(!response.is_partial());

        let response: MessageResponse =
            serde_json::from_value(json!({"id": 3, "isPartialResponse": true})).unwrap();
        assert!(response.is_partial());
    }

    #[test]
    fn terminal_response_omits_partial_flag_on_wire() {
        let response = MessageResponse::new(1, None, vec![json!("ok")], None);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({"id": 1, "args": ["ok"]}));
    }

    #[test]
    fn outbound_event_has_no_id() {
        let event = Outbound::from(MessageEvent::new("themeChange", vec![json!("dark")]));
        assert_eq!(
            event.to_value().unwrap(),
            json!({"func": "themeChange", "args": ["dark"]})
        );
        assert_eq!(event.describe(), "event func=themeChange");
    }

    #[test]
    fn legacy_inbound_request_without_uuid() {
        let request: InboundRequest =
            serde_json::from_value(json!({"id": 4, "func": "getContext"})).unwrap();
        assert_eq!(request.id, Some(4));
        assert!(request.uuid.is_none());
        assert!(request.args.is_empty());
    }
}
