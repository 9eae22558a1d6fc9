//! Child-to-parent proxying.
//!
//! A request from the bound child that no local handler answers is sent on
//! to the parent under a new id. The parent's answers are routed back to the
//! child under the child's original id, but only while that same child
//! window is still bound.

use hostbridge_envelope::{MessageId, MessageResponse};
use hostbridge_window::WindowRef;
use serde_json::Value;
use uuid::Uuid;

/// Telemetry tag carried by every relayed request.
pub const RELAY_API_VERSION_TAG: &str = "v2_tasks.startTask";

/// A child request waiting for the parent's answer.
#[derive(Debug, Clone)]
pub struct RelayRecord {
    /// Id the child used.
    pub child_id: MessageId,
    /// Uuid the child used, when it sent one.
    pub child_uuid: Option<Uuid>,
    /// Child window at forwarding time.
    pub child: WindowRef,
    /// Relayed action, for logs.
    pub func: String,
}

impl RelayRecord {
    /// Response to send down to the child for one parent answer.
    pub fn response(&self, args: Vec<Value>, is_partial_response: Option<bool>) -> MessageResponse {
        MessageResponse::new(self.child_id, self.child_uuid, args, is_partial_response)
    }
}

/// Arguments for answering a child with a handler's return value.
///
/// Lists are sent as-is, any other value becomes a one-element list.
pub fn handler_result_args(result: Value) -> Vec<Value> {
    match result {
        Value::Array(values) => values,
        other => vec![other],
    }
}
