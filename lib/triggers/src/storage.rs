//! Trigger storage contract (§4.1): durable CRUD for triggers and the
//! trigger-fire audit log.

use crate::trigger::{Trigger, TriggerFire};
use async_trait::async_trait;
use silver_telegram_core::{TriggerFireId, TriggerId, WorkflowId};
use silver_telegram_engine::StorageError;

/// Durable CRUD for triggers and trigger fires, mirroring the shape of
/// [`silver_telegram_engine::Storage`].
#[async_trait]
pub trait TriggerStorage: Send + Sync {
    /// Persists a brand-new trigger.
    async fn create_trigger(&self, trigger: Trigger) -> Result<(), StorageError>;
    /// Fetches a trigger by id.
    async fn get_trigger(&self, id: TriggerId) -> Result<Trigger, StorageError>;
    /// Replaces a trigger's stored definition.
    async fn update_trigger(&self, trigger: Trigger) -> Result<(), StorageError>;
    /// Removes a trigger.
    async fn delete_trigger(&self, id: TriggerId) -> Result<(), StorageError>;
    /// Lists every trigger for a workflow.
    async fn list_triggers_by_workflow(&self, workflow_id: WorkflowId) -> Result<Vec<Trigger>, StorageError>;
    /// Lists every enabled trigger, across all workflows (hydrated at
    /// startup and whenever a trigger is re-enabled).
    async fn list_enabled_triggers(&self) -> Result<Vec<Trigger>, StorageError>;

    /// Records a fire. There is no update operation: a `TriggerFire` is
    /// created exactly once, with its final outcome already known.
    async fn create_trigger_fire(&self, fire: TriggerFire) -> Result<(), StorageError>;
    /// Lists fires for a trigger, newest-first, bounded to `limit`.
    async fn list_trigger_fires_by_trigger(
        &self,
        trigger_id: TriggerId,
        limit: usize,
    ) -> Result<Vec<TriggerFire>, StorageError>;
}

/// In-memory reference implementation of [`TriggerStorage`].
pub mod memory {
    use super::{StorageError, Trigger, TriggerFire, TriggerFireId, TriggerId, TriggerStorage, WorkflowId};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct State {
        triggers: HashMap<TriggerId, Trigger>,
        fires: HashMap<TriggerFireId, TriggerFire>,
    }

    /// `Mutex`-backed in-memory [`TriggerStorage`].
    #[derive(Debug, Default)]
    pub struct MemoryTriggerStorage {
        state: Mutex<State>,
    }

    impl MemoryTriggerStorage {
        /// Creates an empty store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl TriggerStorage for MemoryTriggerStorage {
        async fn create_trigger(&self, trigger: Trigger) -> Result<(), StorageError> {
            let mut state = self.state.lock().expect("lock poisoned");
            if state.triggers.contains_key(&trigger.id) {
                return Err(StorageError::Conflict);
            }
            state.triggers.insert(trigger.id, trigger);
            Ok(())
        }

        async fn get_trigger(&self, id: TriggerId) -> Result<Trigger, StorageError> {
            self.state
                .lock()
                .expect("lock poisoned")
                .triggers
                .get(&id)
                .cloned()
                .ok_or(StorageError::NotFound)
        }

        async fn update_trigger(&self, trigger: Trigger) -> Result<(), StorageError> {
            let mut state = self.state.lock().expect("lock poisoned");
            if !state.triggers.contains_key(&trigger.id) {
                return Err(StorageError::NotFound);
            }
            state.triggers.insert(trigger.id, trigger);
            Ok(())
        }

        async fn delete_trigger(&self, id: TriggerId) -> Result<(), StorageError> {
            let mut state = self.state.lock().expect("lock poisoned");
            state
                .triggers
                .remove(&id)
                .map(|_| ())
                .ok_or(StorageError::NotFound)
        }

        async fn list_triggers_by_workflow(&self, workflow_id: WorkflowId) -> Result<Vec<Trigger>, StorageError> {
            Ok(self
                .state
                .lock()
                .expect("lock poisoned")
                .triggers
                .values()
                .filter(|trigger| trigger.workflow_id == workflow_id)
                .cloned()
                .collect())
        }

        async fn list_enabled_triggers(&self) -> Result<Vec<Trigger>, StorageError> {
            Ok(self
                .state
                .lock()
                .expect("lock poisoned")
                .triggers
                .values()
                .filter(|trigger| trigger.enabled)
                .cloned()
                .collect())
        }

        async fn create_trigger_fire(&self, fire: TriggerFire) -> Result<(), StorageError> {
            let mut state = self.state.lock().expect("lock poisoned");
            if state.fires.contains_key(&fire.id) {
                return Err(StorageError::Conflict);
            }
            state.fires.insert(fire.id, fire);
            Ok(())
        }

        async fn list_trigger_fires_by_trigger(
            &self,
            trigger_id: TriggerId,
            limit: usize,
        ) -> Result<Vec<TriggerFire>, StorageError> {
            let state = self.state.lock().expect("lock poisoned");
            let mut fires: Vec<TriggerFire> = state
                .fires
                .values()
                .filter(|fire| fire.trigger_id == trigger_id)
                .cloned()
                .collect();
            fires.sort_by(|a, b| b.fired_at.cmp(&a.fired_at));
            fires.truncate(limit);
            Ok(fires)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::trigger::{TriggerFireStatus, TriggerKind};
        use serde_json::json;

        #[tokio::test]
        async fn create_trigger_then_get_roundtrips() {
            let storage = MemoryTriggerStorage::new();
            let trigger = Trigger::new(WorkflowId::new(), TriggerKind::Cron, json!({"cron": "0 7 * * *"}));
            storage.create_trigger(trigger.clone()).await.unwrap();
            let fetched = storage.get_trigger(trigger.id).await.unwrap();
            assert_eq!(fetched, trigger);
        }

        #[tokio::test]
        async fn list_enabled_triggers_excludes_disabled() {
            let storage = MemoryTriggerStorage::new();
            let mut disabled = Trigger::new(WorkflowId::new(), TriggerKind::Webhook, Value::Null);
            disabled.enabled = false;
            let enabled = Trigger::new(WorkflowId::new(), TriggerKind::Webhook, Value::Null);
            storage.create_trigger(disabled).await.unwrap();
            storage.create_trigger(enabled.clone()).await.unwrap();

            let listed = storage.list_enabled_triggers().await.unwrap();
            assert_eq!(listed, vec![enabled]);
        }

        #[tokio::test]
        async fn trigger_fires_are_newest_first_and_bounded() {
            let storage = MemoryTriggerStorage::new();
            let trigger_id = TriggerId::new();
            for _ in 0..5 {
                storage
                    .create_trigger_fire(TriggerFire {
                        id: TriggerFireId::new(),
                        trigger_id,
                        execution_id: None,
                        fired_at: chrono::Utc::now(),
                        status: TriggerFireStatus::Success,
                        payload: None,
                        error: None,
                    })
                    .await
                    .unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
            let page = storage
                .list_trigger_fires_by_trigger(trigger_id, 3)
                .await
                .unwrap();
            assert_eq!(page.len(), 3);
            assert!(page[0].fired_at >= page[1].fired_at);
        }
    }
}
