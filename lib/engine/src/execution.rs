//! Execution records and the persisted state snapshot.

use crate::node::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use silver_telegram_core::{ExecutionId, WorkflowId};
use std::collections::HashMap;

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Still traversing.
    Running,
    /// Traversal finished without error.
    Completed,
    /// Traversal finished with an error.
    Failed,
    /// Traversal was cancelled.
    Cancelled,
}

impl ExecutionStatus {
    /// Whether this status is a terminal one.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One attempt to run one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Identity of this execution.
    pub id: ExecutionId,
    /// The workflow this execution ran.
    pub workflow_id: WorkflowId,
    /// Lifecycle status.
    pub status: ExecutionStatus,
    /// Serialized state: the persisted execution-state blob.
    pub state: Value,
    /// When this execution was created.
    pub started_at: DateTime<Utc>,
    /// When this execution reached a terminal status, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message, set on the `failed`/`cancelled` terminal transitions.
    pub error: Option<String>,
}

impl Execution {
    /// Creates a new execution in status `running` with empty state.
    #[must_use]
    pub fn new(workflow_id: WorkflowId) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            status: ExecutionStatus::Running,
            state: Value::Object(serde_json::Map::new()),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Whether this execution has reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.completed_at.is_some() && self.status.is_terminal()
    }
}

/// Cached JSON output of one node within one execution.
///
/// Primary key is the `(execution_id, node_id)` pair; reading this before
/// every node visit is the cache-based idempotence contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    /// The execution this result belongs to.
    pub execution_id: ExecutionId,
    /// The node that produced this result.
    pub node_id: NodeId,
    /// The cached output.
    pub data: Value,
}

/// The persisted execution-state blob written to `Execution.state` (§6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Per-node cached output.
    pub results: HashMap<NodeId, Value>,
    /// User-defined variables accumulated during traversal.
    pub variables: HashMap<String, Value>,
    /// The id of the last node visited, whether cached or freshly executed.
    pub current_node_id: Option<NodeId>,
}
