//! Wires up the engine and triggers crates against in-memory storage and
//! fires a single webhook trigger end to end, for manual smoke-testing.

use silver_telegram_engine::storage::memory::MemoryStorage;
use silver_telegram_engine::{EchoExecutor, EngineConfig, ExecutionRegistry, GraphRunner, Node, NodeType, Storage, Workflow, WorkerPool, WorkflowRunner};
use silver_telegram_triggers::storage::memory::MemoryTriggerStorage;
use silver_telegram_triggers::{FireSink, Trigger, TriggerKind, TriggerManager, TriggerStorage};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env().unwrap_or_default();
    tracing::info!(?config, "loaded engine configuration");

    let workflow_storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let trigger_storage: Arc<dyn TriggerStorage> = Arc::new(MemoryTriggerStorage::new());

    let mut workflow = Workflow::new("demo-workflow");
    workflow.add_node(Node::new("greet", NodeType::CustomCode));
    workflow_storage
        .create_workflow(workflow.clone())
        .await
        .expect("create demo workflow");

    let graph_runner = Arc::new(GraphRunner::new(
        Arc::clone(&workflow_storage),
        Arc::new(EchoExecutor),
        config.default_node_timeout_ms,
    ));
    let registry = Arc::new(ExecutionRegistry::new());
    let workflow_runner = Arc::new(WorkflowRunner::new(graph_runner, registry));
    let worker_pool = Arc::new(WorkerPool::new(config.worker_pool_capacity));

    let manager = TriggerManager::new(
        Arc::clone(&trigger_storage),
        Arc::clone(&workflow_storage),
        workflow_runner,
        worker_pool,
        CancellationToken::new(),
    );

    let trigger = Trigger::new(workflow.id, TriggerKind::Webhook, serde_json::Value::Null);
    trigger_storage
        .create_trigger(trigger.clone())
        .await
        .expect("register demo trigger");
    manager.register(&trigger).await.expect("start trigger runner");

    let fire_id = manager
        .fire(trigger.id, Some(serde_json::json!({"hello": "world"})))
        .await;
    tracing::info!(%fire_id, "fired demo trigger");

    let fires = trigger_storage
        .list_trigger_fires_by_trigger(trigger.id, 10)
        .await
        .expect("list trigger fires");
    for fire in fires {
        tracing::info!(?fire, "trigger fire record");
    }
}
