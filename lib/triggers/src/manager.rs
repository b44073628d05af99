//! Trigger manager (§4.8): the live trigger set, plus the Fire fan-in
//! path shared by every trigger kind.

use crate::cron::CronTrigger;
use crate::error::{TriggerManagerError, TriggerRunError};
use crate::external::ExternalProcessTrigger;
use crate::interval::IntervalTrigger;
use crate::runner::{FireSink, TriggerRunner};
use crate::storage::TriggerStorage;
use crate::trigger::{Trigger, TriggerFire, TriggerFireStatus, TriggerKind};
use crate::webhook::WebhookTrigger;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use silver_telegram_core::{TriggerFireId, TriggerId};
use silver_telegram_engine::{Storage, WorkerPool, WorkflowRunner};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Deadline Fire composes its run against (§4.8 step 6).
const FIRE_DEADLINE: Duration = Duration::from_secs(5 * 60);
/// How long an external trigger's child gets to report readiness (§4.7 step 1).
const EXTERNAL_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Holds the live trigger set plus references to the collaborators Fire
/// needs: trigger storage, the workflow runner front-end (which in turn
/// owns the workflow storage and graph runner), and the worker pool that
/// admits every Fire.
pub struct TriggerManager {
    trigger_storage: Arc<dyn TriggerStorage>,
    workflow_storage: Arc<dyn Storage>,
    workflow_runner: Arc<WorkflowRunner>,
    worker_pool: Arc<WorkerPool>,
    cancel: CancellationToken,
    runners: Mutex<HashMap<TriggerId, Arc<dyn TriggerRunner>>>,
}

impl TriggerManager {
    /// Builds a trigger manager. `cancel` is the process-wide shutdown
    /// token every registered runner's lifetime is scoped under.
    #[must_use]
    pub fn new(
        trigger_storage: Arc<dyn TriggerStorage>,
        workflow_storage: Arc<dyn Storage>,
        workflow_runner: Arc<WorkflowRunner>,
        worker_pool: Arc<WorkerPool>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            trigger_storage,
            workflow_storage,
            workflow_runner,
            worker_pool,
            cancel,
            runners: Mutex::new(HashMap::new()),
        })
    }

    fn build_runner(self: &Arc<Self>, trigger: &Trigger) -> Result<Arc<dyn TriggerRunner>, TriggerRunError> {
        let fire_sink: Arc<dyn FireSink> = Arc::clone(self) as Arc<dyn FireSink>;
        match trigger.kind {
            TriggerKind::Cron => {
                let expression = trigger.config["expression"]
                    .as_str()
                    .ok_or_else(|| TriggerRunError::Validation("cron trigger missing config.expression".to_string()))?;
                Ok(Arc::new(CronTrigger::new(trigger.id, expression, fire_sink)?))
            }
            TriggerKind::Interval => {
                let interval_secs = trigger.config["interval_secs"]
                    .as_f64()
                    .ok_or_else(|| TriggerRunError::Validation("interval trigger missing config.interval_secs".to_string()))?;
                Ok(Arc::new(IntervalTrigger::new(trigger.id, interval_secs, fire_sink)?))
            }
            TriggerKind::Webhook => Ok(Arc::new(WebhookTrigger::new(trigger.id))),
            TriggerKind::External => {
                if !trigger.is_valid() {
                    return Err(TriggerRunError::Validation(
                        "external trigger requires a file path".to_string(),
                    ));
                }
                let file_path = trigger.file_path.clone().unwrap_or_default();
                Ok(Arc::new(ExternalProcessTrigger::new(
                    trigger.id,
                    file_path,
                    trigger.config.clone(),
                    fire_sink,
                    EXTERNAL_READY_TIMEOUT,
                )))
            }
        }
    }

    /// Registers and starts the runner for `trigger`.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerManagerError::Conflict`] if a runner for this
    /// trigger id is already registered, or wraps whatever the runner's
    /// `start` returns.
    pub async fn register(self: &Arc<Self>, trigger: &Trigger) -> Result<(), TriggerManagerError> {
        let mut runners = self.runners.lock().await;
        if runners.contains_key(&trigger.id) {
            return Err(TriggerManagerError::Conflict);
        }
        let runner = self.build_runner(trigger)?;
        runner.start(self.cancel.child_token()).await?;
        runners.insert(trigger.id, runner);
        Ok(())
    }

    /// Stops and removes the runner for `trigger_id`, if registered.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerManagerError::NotFound`] if no runner is
    /// registered for this id, or wraps whatever the runner's `stop`
    /// returns.
    pub async fn unregister(&self, trigger_id: TriggerId) -> Result<(), TriggerManagerError> {
        let runner = {
            let mut runners = self.runners.lock().await;
            runners.remove(&trigger_id).ok_or(TriggerManagerError::NotFound)?
        };
        runner.stop().await?;
        Ok(())
    }

    /// Loads every enabled trigger from storage and registers it. Called
    /// at startup.
    ///
    /// # Errors
    ///
    /// Returns the first storage or registration failure encountered.
    pub async fn load_triggers(self: &Arc<Self>) -> Result<usize, TriggerManagerError> {
        let triggers = self.trigger_storage.list_enabled_triggers().await?;
        let mut loaded = 0;
        for trigger in &triggers {
            self.register(trigger).await?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Invokes the `external` trigger `trigger_id` with `payload`,
    /// bypassing Fire. Only meaningful for a running `external` trigger.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerManagerError::NotFound`] if no runner is
    /// registered, or wraps the runner's `invoke` failure (notably
    /// `not-supported` for non-`external` kinds, `not-ready` before the
    /// child signals readiness).
    pub async fn invoke(&self, trigger_id: TriggerId, payload: Value) -> Result<(), TriggerManagerError> {
        let runner = {
            let runners = self.runners.lock().await;
            Arc::clone(runners.get(&trigger_id).ok_or(TriggerManagerError::NotFound)?)
        };
        runner.invoke(payload).await?;
        Ok(())
    }

    async fn fire_inner(&self, trigger_id: TriggerId, payload: Option<Value>) -> (TriggerFire, Result<(), TriggerManagerError>) {
        let id = TriggerFireId::new();
        let fired_at = Utc::now();

        let outcome: Result<Option<silver_telegram_engine::Execution>, TriggerManagerError> = async {
            let trigger = self.trigger_storage.get_trigger(trigger_id).await?;
            let workflow = self.workflow_storage.get_workflow(trigger.workflow_id).await?;

            let trigger_data = payload.clone().unwrap_or(Value::Null);
            let deadline = tokio::time::Instant::now() + FIRE_DEADLINE;

            let execution = self
                .workflow_runner
                .fire(&workflow, trigger_data, self.cancel.child_token(), Some(deadline))
                .await?;
            Ok(Some(execution))
        }
        .await;

        let fire = match &outcome {
            Ok(Some(execution)) => TriggerFire {
                id,
                trigger_id,
                execution_id: Some(execution.id),
                fired_at,
                status: TriggerFireStatus::Success,
                payload,
                error: None,
            },
            Ok(None) => TriggerFire {
                id,
                trigger_id,
                execution_id: None,
                fired_at,
                status: TriggerFireStatus::Skipped,
                payload,
                error: None,
            },
            Err(err) => TriggerFire {
                id,
                trigger_id,
                execution_id: None,
                fired_at,
                status: TriggerFireStatus::Failed,
                payload,
                error: Some(err.to_string()),
            },
        };

        (fire, outcome.map(|_| ()))
    }
}

#[async_trait]
impl FireSink for TriggerManager {
    /// Admits the Fire through the worker pool before running it (§4.8:
    /// "Fire is admitted through the worker pool"), so the bound on
    /// concurrently running workflows (§4.4, §5) actually applies to
    /// trigger-originated runs. Every trigger runner already calls this
    /// from inside its own spawned task, so admission here only blocks
    /// that detached task, never the runner's tick loop.
    async fn fire(&self, trigger_id: TriggerId, payload: Option<Value>) -> TriggerFireId {
        let cancel = self.cancel.child_token();
        let admitted = self
            .worker_pool
            .submit_sync(&cancel, async { Ok(self.fire_inner(trigger_id, payload.clone()).await) })
            .await;

        let (fire, outcome) = match admitted {
            Ok((fire, outcome)) => (fire, outcome),
            Err(engine_err) => (
                TriggerFire {
                    id: TriggerFireId::new(),
                    trigger_id,
                    execution_id: None,
                    fired_at: Utc::now(),
                    status: TriggerFireStatus::Failed,
                    payload,
                    error: Some(format!("not admitted by worker pool: {engine_err}")),
                },
                Err(TriggerManagerError::from(engine_err)),
            ),
        };

        let fire_id = fire.id;
        if let Err(err) = self.trigger_storage.create_trigger_fire(fire).await {
            tracing::warn!(trigger = %trigger_id, error = %err, "failed to persist trigger fire record");
        }
        if let Err(err) = outcome {
            tracing::warn!(trigger = %trigger_id, error = %err, "trigger fire failed");
        }
        fire_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryTriggerStorage;
    use serde_json::json;
    use silver_telegram_engine::storage::memory::MemoryStorage;
    use silver_telegram_engine::{EchoExecutor, GraphRunner};
    use silver_telegram_engine::{ExecutionRegistry, Node, NodeType, Workflow};

    fn build_manager() -> (Arc<TriggerManager>, Arc<MemoryTriggerStorage>, Arc<MemoryStorage>) {
        let trigger_storage = Arc::new(MemoryTriggerStorage::new());
        let workflow_storage = Arc::new(MemoryStorage::new());
        let graph_runner = Arc::new(GraphRunner::new(
            Arc::clone(&workflow_storage) as Arc<dyn Storage>,
            Arc::new(EchoExecutor),
            30_000,
        ));
        let registry = Arc::new(ExecutionRegistry::new());
        let workflow_runner = Arc::new(WorkflowRunner::new(graph_runner, registry));
        let worker_pool = Arc::new(WorkerPool::new(4));
        let manager = TriggerManager::new(
            Arc::clone(&trigger_storage) as Arc<dyn TriggerStorage>,
            Arc::clone(&workflow_storage) as Arc<dyn Storage>,
            workflow_runner,
            worker_pool,
            CancellationToken::new(),
        );
        (manager, trigger_storage, workflow_storage)
    }

    #[tokio::test]
    async fn fire_creates_exactly_one_trigger_fire_on_success() {
        let (manager, trigger_storage, workflow_storage) = build_manager();

        let mut workflow = Workflow::new("wf-1");
        workflow.add_node(Node::new("start", NodeType::CustomCode));
        workflow_storage.create_workflow(workflow.clone()).await.unwrap();

        let trigger = Trigger::new(workflow.id, TriggerKind::Webhook, Value::Null);
        trigger_storage.create_trigger(trigger.clone()).await.unwrap();

        let _fire_id = manager.fire(trigger.id, Some(json!({"foo": "bar"}))).await;

        let fires = trigger_storage
            .list_trigger_fires_by_trigger(trigger.id, 10)
            .await
            .unwrap();
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].status, TriggerFireStatus::Success);
        assert!(fires[0].execution_id.is_some());
        assert_eq!(fires[0].payload.as_ref().unwrap()["foo"], "bar");
    }

    #[tokio::test]
    async fn fire_of_unknown_trigger_records_a_failed_fire() {
        let (manager, trigger_storage, _workflow_storage) = build_manager();
        let unknown = TriggerId::new();

        let _fire_id = manager.fire(unknown, None).await;

        let fires = trigger_storage.list_trigger_fires_by_trigger(unknown, 10).await.unwrap();
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].status, TriggerFireStatus::Failed);
        assert!(fires[0].error.is_some());
    }

    #[tokio::test]
    async fn fire_not_admitted_by_the_worker_pool_still_records_exactly_one_failed_fire() {
        let trigger_storage = Arc::new(MemoryTriggerStorage::new());
        let workflow_storage = Arc::new(MemoryStorage::new());
        let graph_runner = Arc::new(GraphRunner::new(
            Arc::clone(&workflow_storage) as Arc<dyn Storage>,
            Arc::new(EchoExecutor),
            30_000,
        ));
        let registry = Arc::new(ExecutionRegistry::new());
        let workflow_runner = Arc::new(WorkflowRunner::new(graph_runner, registry));
        let worker_pool = Arc::new(WorkerPool::new(1));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let manager = TriggerManager::new(
            Arc::clone(&trigger_storage) as Arc<dyn TriggerStorage>,
            Arc::clone(&workflow_storage) as Arc<dyn Storage>,
            workflow_runner,
            Arc::clone(&worker_pool),
            cancel,
        );

        let mut workflow = Workflow::new("wf-1");
        workflow.add_node(Node::new("start", NodeType::CustomCode));
        workflow_storage.create_workflow(workflow.clone()).await.unwrap();
        let trigger = Trigger::new(workflow.id, TriggerKind::Webhook, Value::Null);
        trigger_storage.create_trigger(trigger.clone()).await.unwrap();

        manager.fire(trigger.id, None).await;

        let fires = trigger_storage.list_trigger_fires_by_trigger(trigger.id, 10).await.unwrap();
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].status, TriggerFireStatus::Failed);
        assert!(fires[0].error.as_ref().unwrap().contains("not admitted"));
        assert_eq!(worker_pool.active_count(), 0);
    }

    #[tokio::test]
    async fn register_then_unregister_roundtrips() {
        let (manager, _trigger_storage, workflow_storage) = build_manager();
        let mut workflow = Workflow::new("wf-1");
        workflow.add_node(Node::new("start", NodeType::CustomCode));
        workflow_storage.create_workflow(workflow.clone()).await.unwrap();

        let trigger = Trigger::new(workflow.id, TriggerKind::Webhook, Value::Null);
        manager.register(&trigger).await.unwrap();
        assert_eq!(manager.register(&trigger).await.unwrap_err(), TriggerManagerError::Conflict);
        manager.unregister(trigger.id).await.unwrap();
        assert_eq!(manager.unregister(trigger.id).await.unwrap_err(), TriggerManagerError::NotFound);
    }

    #[tokio::test]
    async fn scenario_7_webhook_fire_persists_body_payload() {
        let (manager, trigger_storage, workflow_storage) = build_manager();
        let mut workflow = Workflow::new("wf-1");
        workflow.add_node(Node::new("start", NodeType::CustomCode));
        workflow_storage.create_workflow(workflow.clone()).await.unwrap();

        let trigger = Trigger::new(workflow.id, TriggerKind::Webhook, Value::Null);
        trigger_storage.create_trigger(trigger.clone()).await.unwrap();

        manager.fire(trigger.id, Some(json!({"body": {"foo": "bar"}}))).await;

        let fires = trigger_storage.list_trigger_fires_by_trigger(trigger.id, 10).await.unwrap();
        assert_eq!(fires[0].payload.as_ref().unwrap()["body"]["foo"], "bar");
    }
}
