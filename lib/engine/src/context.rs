//! In-memory execution context.
//!
//! Holds the live state of one run: per-node results, user variables, and
//! the trigger payload. Never shared — owned by exactly one traversal at a
//! time (§5).

use crate::execution::StateSnapshot;
use crate::node::NodeId;
use serde_json::Value;
use silver_telegram_core::{ExecutionId, WorkflowId};
use std::collections::HashMap;

/// In-memory state of one execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The workflow being run.
    pub workflow_id: WorkflowId,
    /// The execution this context belongs to.
    pub execution_id: ExecutionId,
    /// Per-node results accumulated so far.
    pub results: HashMap<NodeId, Value>,
    /// User-defined variables.
    pub variables: HashMap<String, Value>,
    /// The payload the triggering Fire carried, if any.
    pub trigger_data: Value,
    /// The id of the last node visited (cached or freshly executed).
    pub current_node_id: Option<NodeId>,
}

impl ExecutionContext {
    /// Creates a fresh context for a brand-new execution.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, execution_id: ExecutionId, trigger_data: Value) -> Self {
        Self {
            workflow_id,
            execution_id,
            results: HashMap::new(),
            variables: HashMap::new(),
            trigger_data,
            current_node_id: None,
        }
    }

    /// Rebuilds a context from a persisted [`StateSnapshot`], for Resume.
    #[must_use]
    pub fn from_snapshot(
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        snapshot: StateSnapshot,
    ) -> Self {
        Self {
            workflow_id,
            execution_id,
            results: snapshot.results,
            variables: snapshot.variables,
            trigger_data: Value::Null,
            current_node_id: snapshot.current_node_id,
        }
    }

    /// Captures the current state as a persistable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            results: self.results.clone(),
            variables: self.variables.clone(),
            current_node_id: self.current_node_id.clone(),
        }
    }

    /// Records a node's output and marks it as last-visited.
    pub fn record(&mut self, node_id: NodeId, data: Value) {
        self.current_node_id = Some(node_id.clone());
        self.results.insert(node_id, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_from_snapshot() {
        let mut ctx = ExecutionContext::new(WorkflowId::new(), ExecutionId::new(), Value::Null);
        ctx.record(NodeId::new("n"), serde_json::json!({"ok": true}));
        ctx.variables.insert("foo".into(), "bar".into());

        let snapshot = ctx.snapshot();
        let rebuilt = ExecutionContext::from_snapshot(ctx.workflow_id, ctx.execution_id, snapshot);

        assert_eq!(rebuilt.current_node_id, Some(NodeId::new("n")));
        assert_eq!(rebuilt.variables.get("foo"), Some(&Value::from("bar")));
    }
}
