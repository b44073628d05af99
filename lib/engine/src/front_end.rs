//! Workflow runner front-end (§4.6): a thin adapter used when a trigger
//! fires.
//!
//! Wraps a [`GraphRunner`], registering the new execution's cancellation
//! handle in the [`ExecutionRegistry`] before traversal begins (so an
//! external cancel reaches the run even in its first node) and
//! unregistering once traversal exits, regardless of outcome.

use crate::error::EngineError;
use crate::execution::Execution;
use crate::registry::ExecutionRegistry;
use crate::runner::GraphRunner;
use crate::workflow::Workflow;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Thin façade wrapping [`GraphRunner`] with registry bookkeeping.
pub struct WorkflowRunner {
    graph_runner: Arc<GraphRunner>,
    registry: Arc<ExecutionRegistry>,
}

impl WorkflowRunner {
    /// Builds a front-end over the given graph runner and registry.
    #[must_use]
    pub fn new(graph_runner: Arc<GraphRunner>, registry: Arc<ExecutionRegistry>) -> Self {
        Self {
            graph_runner,
            registry,
        }
    }

    /// Runs `workflow` from its start node under `parent_cancel`,
    /// registering and unregistering the execution with the registry
    /// around the run.
    ///
    /// # Errors
    ///
    /// Whatever [`GraphRunner::drive_new`] returns.
    pub async fn fire(
        &self,
        workflow: &Workflow,
        trigger_data: Value,
        parent_cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Execution, EngineError> {
        let execution = self.graph_runner.create_execution(workflow.id).await?;
        let execution_id = execution.id;
        let cancel = parent_cancel.child_token();
        self.registry.register(execution_id, cancel.clone());

        let result = self
            .graph_runner
            .drive_new(workflow, execution, trigger_data, cancel, deadline)
            .await;

        self.registry.unregister(execution_id);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockExecutor;
    use crate::node::{Node, NodeType};
    use crate::storage::memory::MemoryStorage;
    use crate::ExecutionStatus;

    #[tokio::test]
    async fn fire_registers_then_unregisters_around_the_run() {
        let storage = Arc::new(MemoryStorage::new());
        let graph_runner = Arc::new(GraphRunner::new(
            storage,
            Arc::new(MockExecutor::succeeding(serde_json::json!({"ok": true}))),
            30_000,
        ));
        let registry = Arc::new(ExecutionRegistry::new());
        let front_end = WorkflowRunner::new(graph_runner, Arc::clone(&registry));

        let mut workflow = Workflow::new("wf");
        workflow.add_node(Node::new("n", NodeType::CustomCode));

        let execution = front_end
            .fire(&workflow, Value::Null, CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(registry.active_count(), 0);
    }
}
