//! Interval trigger (§4.7): fires every N seconds, otherwise behaving
//! like the cron trigger.

use crate::error::TriggerRunError;
use crate::runner::{FireSink, TriggerRunner};
use crate::trigger::TriggerKind;
use async_trait::async_trait;
use silver_telegram_core::TriggerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fires on a fixed interval, `interval_secs` apart.
pub struct IntervalTrigger {
    id: TriggerId,
    interval: Duration,
    fire_sink: Arc<dyn FireSink>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IntervalTrigger {
    /// Builds an interval trigger.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerRunError::Validation`] if `interval_secs` is not
    /// positive.
    pub fn new(id: TriggerId, interval_secs: f64, fire_sink: Arc<dyn FireSink>) -> Result<Self, TriggerRunError> {
        if !(interval_secs > 0.0) {
            return Err(TriggerRunError::Validation(format!(
                "interval must be positive, got {interval_secs}"
            )));
        }
        Ok(Self {
            id,
            interval: Duration::from_secs_f64(interval_secs),
            fire_sink,
            task: Mutex::new(None),
        })
    }
}

#[async_trait]
impl TriggerRunner for IntervalTrigger {
    fn id(&self) -> TriggerId {
        self.id
    }

    fn kind(&self) -> TriggerKind {
        TriggerKind::Interval
    }

    async fn start(&self, parent_cancel: CancellationToken) -> Result<(), TriggerRunError> {
        let id = self.id;
        let interval = self.interval;
        let fire_sink = Arc::clone(&self.fire_sink);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = parent_cancel.cancelled() => return,
                    () = tokio::time::sleep(interval) => {
                        let sink = Arc::clone(&fire_sink);
                        tokio::spawn(async move {
                            sink.fire(id, None).await;
                        });
                    }
                }
            }
        });

        *self.task.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TriggerRunError> {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::test_support::RecordingFireSink;

    #[test]
    fn non_positive_interval_is_rejected() {
        let sink = Arc::new(RecordingFireSink::default());
        let err = IntervalTrigger::new(TriggerId::new(), 0.0, sink).unwrap_err();
        assert!(matches!(err, TriggerRunError::Validation(_)));
    }

    #[tokio::test]
    async fn fires_at_least_once_within_a_few_ticks() {
        let sink = Arc::new(RecordingFireSink::default());
        let trigger = IntervalTrigger::new(TriggerId::new(), 0.01, Arc::clone(&sink) as Arc<dyn FireSink>).unwrap();
        trigger.start(CancellationToken::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.stop().await.unwrap();
        assert!(!sink.fires.lock().unwrap().is_empty());
    }
}
