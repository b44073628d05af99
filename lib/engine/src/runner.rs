//! Graph runner (§4.5): the heart of the engine.
//!
//! Drives one execution to completion (or to its next cancellation/error
//! boundary) by repeatedly looking up a node, either adopting a cached
//! result or invoking the node executor, then routing to the next node
//! via the first matching edge.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::execution::{Execution, ExecutionStatus, NodeResult, StateSnapshot};
use crate::executor::NodeExecutor;
use crate::node::NodeId;
use crate::resolver;
use crate::storage::Storage;
use crate::workflow::Workflow;
use serde_json::Value;
use silver_telegram_core::{ExecutionId, WorkflowId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Interprets the executor's raw output per §4.5 step 5: a scalar routes
/// `"default"`; a mapping with an explicit `port` field adopts it; a
/// mapping with a nested `data` mapping stores that inner mapping and
/// routes on its boolean `result` field, if any.
fn parse_output(raw: Value) -> (String, Value) {
    match raw {
        Value::Object(map) => {
            if let Some(Value::String(port)) = map.get("port") {
                let port = port.clone();
                (port, Value::Object(map))
            } else if let Some(Value::Object(inner)) = map.get("data") {
                let inner = Value::Object(inner.clone());
                let port = port_from_data(&inner);
                (port, inner)
            } else {
                ("default".to_string(), Value::Object(map))
            }
        }
        scalar => ("default".to_string(), scalar),
    }
}

/// Re-derives a routing port from a node's stored data, used both for the
/// nested-`data` case in [`parse_output`] and to route past a cache hit,
/// whose stored value is already post-extraction.
fn port_from_data(data: &Value) -> String {
    if let Value::Object(map) = data {
        if let Some(Value::Bool(result)) = map.get("result") {
            return result.to_string();
        }
    }
    "default".to_string()
}

/// Drives one workflow's traversal.
pub struct GraphRunner {
    storage: Arc<dyn Storage>,
    executor: Arc<dyn NodeExecutor>,
    default_node_timeout_ms: u64,
}

impl GraphRunner {
    /// Builds a runner over the given storage and node executor.
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        executor: Arc<dyn NodeExecutor>,
        default_node_timeout_ms: u64,
    ) -> Self {
        Self {
            storage,
            executor,
            default_node_timeout_ms,
        }
    }

    /// Creates a fresh execution row for `workflow_id`, without driving
    /// traversal. Split out from [`Self::run`] so callers (the workflow
    /// runner front-end) can register the execution's cancellation handle
    /// before traversal begins.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn create_execution(&self, workflow_id: WorkflowId) -> Result<Execution, EngineError> {
        self.storage
            .create_execution(workflow_id)
            .await
            .map_err(EngineError::from)
    }

    /// Drives a freshly created execution from the workflow's start node.
    ///
    /// # Errors
    ///
    /// Fails `no-start-node` if the workflow has none, `node-not-found` if
    /// an edge points at a missing node, `executor-error`/`timeout`/
    /// `cancelled` per the traversal loop.
    pub async fn drive_new(
        &self,
        workflow: &Workflow,
        execution: Execution,
        trigger_data: Value,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Execution, EngineError> {
        let mut ctx = ExecutionContext::new(workflow.id, execution.id, trigger_data);
        match workflow.start_node() {
            Ok(start) => {
                let start = start.clone();
                self.traverse_and_persist(workflow, execution, ctx, start, cancel, deadline)
                    .await
            }
            Err(graph_err) => {
                let err = EngineError::from(graph_err);
                let _ = self.write_terminal(&execution, &ctx, &Err(err.clone())).await;
                Err(err)
            }
        }
    }

    /// Creates a new execution and drives it to completion in one call.
    ///
    /// # Errors
    ///
    /// See [`Self::drive_new`].
    pub async fn run(
        &self,
        workflow: &Workflow,
        trigger_data: Value,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Execution, EngineError> {
        let execution = self.create_execution(workflow.id).await?;
        self.drive_new(workflow, execution, trigger_data, cancel, deadline)
            .await
    }

    /// Resumes a previously started execution from its persisted state.
    ///
    /// # Errors
    ///
    /// Fails `no-saved-state` if state is absent, `state-parse-error` if
    /// malformed, `node-not-found` if the saved current node is absent
    /// from `workflow`.
    pub async fn resume(
        &self,
        workflow: &Workflow,
        execution_id: ExecutionId,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Execution, EngineError> {
        let execution = self.storage.get_execution(execution_id).await?;

        let is_empty = match &execution.state {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if is_empty {
            return Err(EngineError::NoSavedState);
        }

        let snapshot: StateSnapshot = serde_json::from_value(execution.state.clone())
            .map_err(|err| EngineError::StateParseError(err.to_string()))?;
        let current = snapshot
            .current_node_id
            .clone()
            .ok_or(EngineError::NoSavedState)?;
        if workflow.get_node(&current).is_none() {
            return Err(EngineError::NodeNotFound(current));
        }

        let ctx = ExecutionContext::from_snapshot(workflow.id, execution.id, snapshot);
        self.traverse_and_persist(workflow, execution, ctx, current, cancel, deadline)
            .await
    }

    async fn traverse_and_persist(
        &self,
        workflow: &Workflow,
        execution: Execution,
        mut ctx: ExecutionContext,
        start: NodeId,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Execution, EngineError> {
        let result = self.traverse(workflow, &mut ctx, start, &cancel, deadline).await;
        let updated = self.write_terminal(&execution, &ctx, &result).await;
        result.map(|()| updated)
    }

    /// The traversal loop (§4.5): cache lookup, resolve + execute on a
    /// miss, parse the produced port, route via the first matching edge.
    async fn traverse(
        &self,
        workflow: &Workflow,
        ctx: &mut ExecutionContext,
        start: NodeId,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<(), EngineError> {
        let mut current = start;

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(EngineError::Timeout);
            }

            let node = workflow
                .get_node(&current)
                .cloned()
                .ok_or_else(|| EngineError::NodeNotFound(current.clone()))?;

            let cached = self
                .storage
                .get_node_result(ctx.execution_id, &current)
                .await
                .map_err(EngineError::from)?;

            let produced_port = if let Some(data) = cached {
                let port = port_from_data(&data);
                ctx.record(current.clone(), data);
                port
            } else {
                let resolved_config =
                    resolver::resolve(&Value::Object(node.config.clone()), ctx)?;
                let payload = serde_json::json!({ "config": resolved_config });

                let timeout_ms = node.timeout_ms().unwrap_or(self.default_node_timeout_ms);
                let node_budget = Duration::from_millis(timeout_ms);
                let effective_budget = match deadline {
                    Some(d) => node_budget.min(d.saturating_duration_since(Instant::now())),
                    None => node_budget,
                };

                let raw = tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(EngineError::Cancelled),
                    () = tokio::time::sleep(effective_budget) => Err(EngineError::Timeout),
                    result = self.executor.execute(node.node_type, payload) => {
                        result.map_err(|err| EngineError::ExecutorError(err.to_string()))
                    }
                }?;

                let (port, data) = parse_output(raw);
                ctx.record(current.clone(), data.clone());

                if let Err(err) = self
                    .storage
                    .put_node_result(NodeResult {
                        execution_id: ctx.execution_id,
                        node_id: current.clone(),
                        data,
                    })
                    .await
                {
                    tracing::warn!(error = %err, node = %current, "failed to persist node result cache entry");
                }

                port
            };

            match workflow.route(&current, &produced_port) {
                Some(next) => current = next.clone(),
                None => return Ok(()),
            }
        }
    }

    async fn write_terminal(
        &self,
        execution: &Execution,
        ctx: &ExecutionContext,
        result: &Result<(), EngineError>,
    ) -> Execution {
        let status = match result {
            Ok(()) => ExecutionStatus::Completed,
            Err(EngineError::Cancelled) => ExecutionStatus::Cancelled,
            Err(_) => ExecutionStatus::Failed,
        };
        let snapshot = ctx.snapshot();
        let state = serde_json::to_value(&snapshot).unwrap_or(Value::Null);
        let error = result.as_ref().err().map(ToString::to_string);

        if let Err(err) = self
            .storage
            .update_execution_status(execution.id, status, state.clone(), error.clone())
            .await
        {
            tracing::warn!(error = %err, execution = %execution.id, "failed to persist terminal execution status");
        }

        let mut updated = execution.clone();
        updated.status = status;
        updated.state = state;
        updated.error = error;
        if status.is_terminal() {
            updated.completed_at = Some(chrono::Utc::now());
        }
        updated
    }
}
