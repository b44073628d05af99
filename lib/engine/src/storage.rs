//! Storage contract (§4.1): a capability surface, not a schema.
//!
//! The engine depends on this trait, not on any particular database. Every
//! operation fails with one of the three [`StorageError`] kinds.

use crate::error::StorageError;
use crate::execution::{Execution, ExecutionStatus, NodeResult};
use crate::node::NodeId;
use crate::workflow::Workflow;
use async_trait::async_trait;
use serde_json::Value;
use silver_telegram_core::{ExecutionId, WorkflowId};

/// Durable CRUD for workflows, executions, and node results.
///
/// Durability guarantee required by the engine: each individual operation
/// is atomic and visible to subsequent reads in the same process.
/// Cross-operation transactions are not required.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists a brand-new workflow.
    async fn create_workflow(&self, workflow: Workflow) -> Result<(), StorageError>;
    /// Fetches a workflow by id.
    async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, StorageError>;
    /// Replaces a workflow's stored definition.
    async fn update_workflow(&self, workflow: Workflow) -> Result<(), StorageError>;
    /// Removes a workflow.
    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), StorageError>;
    /// Lists every workflow.
    async fn list_workflows(&self) -> Result<Vec<Workflow>, StorageError>;

    /// Creates a new execution for `workflow_id` in status `running` with
    /// empty state.
    async fn create_execution(&self, workflow_id: WorkflowId) -> Result<Execution, StorageError>;
    /// Updates an execution's status, state blob, and optional error.
    async fn update_execution_status(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        state: Value,
        error: Option<String>,
    ) -> Result<(), StorageError>;
    /// Fetches an execution by id.
    async fn get_execution(&self, id: ExecutionId) -> Result<Execution, StorageError>;
    /// Lists executions for a workflow, newest-first, bounded to `limit`.
    async fn list_executions_by_workflow(
        &self,
        workflow_id: WorkflowId,
        limit: usize,
    ) -> Result<Vec<Execution>, StorageError>;

    /// Upserts a cached node result, keyed by `(execution_id, node_id)`.
    async fn put_node_result(&self, result: NodeResult) -> Result<(), StorageError>;
    /// Reads a cached node result. Absence is `Ok(None)`, not an error —
    /// a cache miss is the expected steady state for a fresh traversal.
    async fn get_node_result(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
    ) -> Result<Option<Value>, StorageError>;
}

/// In-memory reference implementation of [`Storage`].
///
/// Useful for tests and for embedding the engine ahead of a real
/// persistence layer.
pub mod memory {
    use super::{Execution, ExecutionStatus, NodeId, NodeResult, Storage, StorageError, Value, Workflow};
    use async_trait::async_trait;
    use silver_telegram_core::{ExecutionId, WorkflowId};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct State {
        workflows: HashMap<WorkflowId, Workflow>,
        executions: HashMap<ExecutionId, Execution>,
        node_results: HashMap<(ExecutionId, NodeId), Value>,
    }

    /// `Mutex`-backed in-memory [`Storage`].
    #[derive(Debug, Default)]
    pub struct MemoryStorage {
        state: Mutex<State>,
    }

    impl MemoryStorage {
        /// Creates an empty store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl Storage for MemoryStorage {
        async fn create_workflow(&self, workflow: Workflow) -> Result<(), StorageError> {
            let mut state = self.state.lock().expect("lock poisoned");
            if state.workflows.contains_key(&workflow.id) {
                return Err(StorageError::Conflict);
            }
            state.workflows.insert(workflow.id, workflow);
            Ok(())
        }

        async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, StorageError> {
            self.state
                .lock()
                .expect("lock poisoned")
                .workflows
                .get(&id)
                .cloned()
                .ok_or(StorageError::NotFound)
        }

        async fn update_workflow(&self, workflow: Workflow) -> Result<(), StorageError> {
            let mut state = self.state.lock().expect("lock poisoned");
            if !state.workflows.contains_key(&workflow.id) {
                return Err(StorageError::NotFound);
            }
            state.workflows.insert(workflow.id, workflow);
            Ok(())
        }

        async fn delete_workflow(&self, id: WorkflowId) -> Result<(), StorageError> {
            let mut state = self.state.lock().expect("lock poisoned");
            state
                .workflows
                .remove(&id)
                .map(|_| ())
                .ok_or(StorageError::NotFound)
        }

        async fn list_workflows(&self) -> Result<Vec<Workflow>, StorageError> {
            Ok(self
                .state
                .lock()
                .expect("lock poisoned")
                .workflows
                .values()
                .cloned()
                .collect())
        }

        async fn create_execution(&self, workflow_id: WorkflowId) -> Result<Execution, StorageError> {
            let execution = Execution::new(workflow_id);
            self.state
                .lock()
                .expect("lock poisoned")
                .executions
                .insert(execution.id, execution.clone());
            Ok(execution)
        }

        async fn update_execution_status(
            &self,
            execution_id: ExecutionId,
            status: ExecutionStatus,
            state_blob: Value,
            error: Option<String>,
        ) -> Result<(), StorageError> {
            let mut state = self.state.lock().expect("lock poisoned");
            let execution = state
                .executions
                .get_mut(&execution_id)
                .ok_or(StorageError::NotFound)?;
            execution.status = status;
            execution.state = state_blob;
            execution.error = error;
            if status.is_terminal() {
                execution.completed_at = Some(chrono::Utc::now());
            }
            Ok(())
        }

        async fn get_execution(&self, id: ExecutionId) -> Result<Execution, StorageError> {
            self.state
                .lock()
                .expect("lock poisoned")
                .executions
                .get(&id)
                .cloned()
                .ok_or(StorageError::NotFound)
        }

        async fn list_executions_by_workflow(
            &self,
            workflow_id: WorkflowId,
            limit: usize,
        ) -> Result<Vec<Execution>, StorageError> {
            let state = self.state.lock().expect("lock poisoned");
            let mut executions: Vec<Execution> = state
                .executions
                .values()
                .filter(|execution| execution.workflow_id == workflow_id)
                .cloned()
                .collect();
            executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            executions.truncate(limit);
            Ok(executions)
        }

        async fn put_node_result(&self, result: NodeResult) -> Result<(), StorageError> {
            self.state
                .lock()
                .expect("lock poisoned")
                .node_results
                .insert((result.execution_id, result.node_id), result.data);
            Ok(())
        }

        async fn get_node_result(
            &self,
            execution_id: ExecutionId,
            node_id: &NodeId,
        ) -> Result<Option<Value>, StorageError> {
            Ok(self
                .state
                .lock()
                .expect("lock poisoned")
                .node_results
                .get(&(execution_id, node_id.clone()))
                .cloned())
        }
    }

}
