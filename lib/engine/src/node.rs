//! Node types and configuration.
//!
//! A node is a vertex of the workflow graph: an id, a type tag drawn from a
//! closed set, and an opaque configuration bag. The configuration bag is
//! arbitrary JSON — the engine never interprets it beyond reading the
//! `timeout_ms` key (see [`crate::runner`]) and handing the rest to the
//! node executor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Identity of a node within a single workflow.
///
/// Unlike [`silver_telegram_core::WorkflowId`], node ids are author-supplied
/// strings from the workflow editor, not system-generated ULIDs — the
/// variable resolver's `$node.<nodeId>` path segment must match them
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wraps an author-supplied string as a node id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The closed set of node type tags the engine recognizes.
///
/// Trigger-only tags mark a node as an entry point fed by a
/// [`silver_telegram_triggers`]-managed trigger rather than by an inbound
/// edge; the graph runner still starts traversal from whichever node has no
/// inbound edge, trigger or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Performs an HTTP request.
    HttpRequest,
    /// Runs opaque user-authored code.
    CustomCode,
    /// Evaluates a boolean expression and routes `true`/`false`.
    Condition,
    /// Repeats a sub-traversal (interpretation left to the node executor).
    Loop,
    /// Reshapes its input with an expression.
    Transform,
    /// Delays traversal.
    Delay,
    /// Reads or writes a file.
    FileOp,
    /// Runs a database operation.
    DatabaseOp,
    /// Receives webhook payloads mid-graph.
    Webhook,
    /// Assigns a value into the execution context's variables.
    SetVariable,
    /// Reads a value from the execution context's variables.
    GetVariable,
    /// Entry point fed by a cron trigger.
    TriggerCron,
    /// Entry point fed by an interval trigger.
    TriggerInterval,
    /// Entry point fed by a webhook trigger.
    TriggerWebhook,
    /// Entry point fed by an external-process trigger.
    TriggerExternal,
}

/// A vertex of the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identity of the node, unique within its workflow.
    pub id: NodeId,
    /// The type tag.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Opaque configuration bag; arbitrary JSON object.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Optional display metadata (editor position, label, …); opaque to the
    /// engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<Value>,
}

impl Node {
    /// Creates a node with an empty configuration bag.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            config: Map::new(),
            display: None,
        }
    }

    /// Reads the `timeout_ms` configuration key.
    ///
    /// Returns `None` when the key is missing, non-numeric, or non-positive
    /// — callers fall back to the 30 second default in that case.
    #[must_use]
    pub fn timeout_ms(&self) -> Option<u64> {
        self.config
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .filter(|millis| *millis > 0)
    }
}
