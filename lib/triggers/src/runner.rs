//! Trigger runner abstraction (§4.7): the common capability set every
//! trigger variant implements.

use crate::error::TriggerRunError;
use crate::trigger::TriggerKind;
use async_trait::async_trait;
use serde_json::Value;
use silver_telegram_core::{TriggerFireId, TriggerId};
use tokio_util::sync::CancellationToken;

/// One polymorphic trigger: identity, type, and its start/stop/invoke
/// lifecycle.
#[async_trait]
pub trait TriggerRunner: Send + Sync {
    /// This trigger's identity.
    fn id(&self) -> TriggerId;

    /// This trigger's kind.
    fn kind(&self) -> TriggerKind;

    /// Begins emitting fires. May fail during startup (e.g. the
    /// external-process child never reaches `ready`).
    async fn start(&self, parent_cancel: CancellationToken) -> Result<(), TriggerRunError>;

    /// Ceases emitting, releases resources. Idempotent.
    async fn stop(&self) -> Result<(), TriggerRunError>;

    /// Synchronous push of an event. Supported only by the `external`
    /// variant; every other kind fails `not-supported`.
    async fn invoke(&self, _payload: Value) -> Result<(), TriggerRunError> {
        Err(TriggerRunError::NotSupported)
    }
}

/// Capability a trigger runner uses to fan into the trigger manager's
/// `Fire` operation without holding a reference back to the manager
/// itself.
#[async_trait]
pub trait FireSink: Send + Sync {
    /// Fires `trigger_id` with an optional payload, returning the id of
    /// the `TriggerFire` audit record created.
    async fn fire(&self, trigger_id: TriggerId, payload: Option<Value>) -> TriggerFireId;
}

/// Test double recording every fire it receives and returning a
/// caller-chosen status.
#[cfg(test)]
pub(crate) mod test_support {
    use super::{FireSink, TriggerFireId, TriggerId, Value};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingFireSink {
        pub(crate) fires: Mutex<Vec<(TriggerId, Option<Value>)>>,
    }

    #[async_trait]
    impl FireSink for RecordingFireSink {
        async fn fire(&self, trigger_id: TriggerId, payload: Option<Value>) -> TriggerFireId {
            self.fires
                .lock()
                .expect("lock poisoned")
                .push((trigger_id, payload));
            TriggerFireId::new()
        }
    }
}
