//! Webhook trigger (§4.7): passive. `start` only logs readiness; the HTTP
//! collaborator invokes the trigger manager's Fire directly when a
//! request arrives for this trigger's id.

use crate::error::TriggerRunError;
use crate::runner::TriggerRunner;
use crate::trigger::TriggerKind;
use async_trait::async_trait;
use silver_telegram_core::TriggerId;
use tokio_util::sync::CancellationToken;

/// A passively-fired trigger: it never ticks on its own.
pub struct WebhookTrigger {
    id: TriggerId,
}

impl WebhookTrigger {
    /// Builds a webhook trigger.
    #[must_use]
    pub fn new(id: TriggerId) -> Self {
        Self { id }
    }
}

#[async_trait]
impl TriggerRunner for WebhookTrigger {
    fn id(&self) -> TriggerId {
        self.id
    }

    fn kind(&self) -> TriggerKind {
        TriggerKind::Webhook
    }

    async fn start(&self, _parent_cancel: CancellationToken) -> Result<(), TriggerRunError> {
        tracing::info!(trigger = %self.id, "webhook trigger ready");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TriggerRunError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_and_stop_are_no_ops() {
        let trigger = WebhookTrigger::new(TriggerId::new());
        assert!(trigger.start(CancellationToken::new()).await.is_ok());
        assert!(trigger.stop().await.is_ok());
    }

    #[tokio::test]
    async fn invoke_is_not_supported() {
        let trigger = WebhookTrigger::new(TriggerId::new());
        let err = trigger.invoke(serde_json::Value::Null).await.unwrap_err();
        assert_eq!(err, TriggerRunError::NotSupported);
    }
}
