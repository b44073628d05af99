//! Line-delimited JSON IPC protocol spoken with an external-process
//! trigger's child (§6).
//!
//! One object per line, UTF-8, `\n`-terminated, bidirectional over the
//! child's standard streams.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message the host sends to the child.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// Begin operation, carrying the trigger's config.
    Start {
        /// The trigger's configuration bag.
        config: Value,
    },
    /// Synchronous event from host to child.
    Invoke {
        /// The payload being pushed.
        payload: Value,
    },
    /// Request graceful exit.
    Kill,
    /// The host's response to a prior `event`.
    Reply {
        /// Echoes the `event`'s `requestId` verbatim.
        #[serde(rename = "requestId")]
        request_id: String,
        /// Set if the workflow run failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Lifecycle status carried by a child's `status` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildStatus {
    /// The child finished its startup handshake.
    Ready,
    /// The child failed to start.
    Error,
}

/// A message the child sends to the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChildMessage {
    /// Lifecycle signal.
    Status {
        /// `ready` or `error`.
        status: ChildStatus,
        /// Optional human-readable detail.
        message: Option<String>,
    },
    /// The child fires a workflow.
    Event {
        /// Correlates with the host's `reply`.
        #[serde(rename = "requestId")]
        request_id: String,
        /// The event payload.
        payload: Value,
    },
    /// Non-fatal child-side error.
    Error {
        /// Error message.
        message: String,
        /// Optional stack trace.
        stack: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_start_message_serializes_with_tag() {
        let msg = HostMessage::Start { config: json!({"a": 1}) };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["config"]["a"], 1);
    }

    #[test]
    fn reply_omits_error_when_absent() {
        let msg = HostMessage::Reply {
            request_id: "r1".to_string(),
            error: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["requestId"], "r1");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn child_status_message_deserializes() {
        let line = r#"{"type":"status","status":"ready","message":null}"#;
        let msg: ChildMessage = serde_json::from_str(line).unwrap();
        assert!(matches!(
            msg,
            ChildMessage::Status {
                status: ChildStatus::Ready,
                ..
            }
        ));
    }

    #[test]
    fn child_event_message_deserializes_request_id() {
        let line = r#"{"type":"event","requestId":"req-1","payload":{"from":"onStart"}}"#;
        let msg: ChildMessage = serde_json::from_str(line).unwrap();
        match msg {
            ChildMessage::Event { request_id, payload } => {
                assert_eq!(request_id, "req-1");
                assert_eq!(payload["from"], "onStart");
            }
            _ => panic!("expected event"),
        }
    }
}
