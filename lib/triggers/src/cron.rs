//! Cron trigger (§4.7): parses a standard 5-field schedule and spawns an
//! asynchronous Fire of its workflow on each tick.

use crate::error::TriggerRunError;
use crate::runner::{FireSink, TriggerRunner};
use crate::trigger::TriggerKind;
use async_trait::async_trait;
use cron::Schedule;
use serde_json::Value;
use silver_telegram_core::TriggerId;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Parses a standard 5-field (minute hour day month weekday) cron
/// expression. The `cron` crate expects an optional leading seconds
/// field, so a `"0 "` is prepended before parsing.
fn parse_schedule(expression: &str) -> Result<Schedule, TriggerRunError> {
    Schedule::from_str(&format!("0 {expression}"))
        .map_err(|err| TriggerRunError::Validation(format!("invalid cron expression '{expression}': {err}")))
}

/// Fires on every tick of a 5-field cron schedule.
pub struct CronTrigger {
    id: TriggerId,
    expression: String,
    fire_sink: Arc<dyn FireSink>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CronTrigger {
    /// Builds a cron trigger. Validates `expression` eagerly so a bad
    /// schedule fails at construction, not on first tick.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerRunError::Validation`] if `expression` does not
    /// parse.
    pub fn new(id: TriggerId, expression: impl Into<String>, fire_sink: Arc<dyn FireSink>) -> Result<Self, TriggerRunError> {
        let expression = expression.into();
        parse_schedule(&expression)?;
        Ok(Self {
            id,
            expression,
            fire_sink,
            task: Mutex::new(None),
        })
    }
}

#[async_trait]
impl TriggerRunner for CronTrigger {
    fn id(&self) -> TriggerId {
        self.id
    }

    fn kind(&self) -> TriggerKind {
        TriggerKind::Cron
    }

    async fn start(&self, parent_cancel: CancellationToken) -> Result<(), TriggerRunError> {
        let schedule = parse_schedule(&self.expression)?;
        let id = self.id;
        let fire_sink = Arc::clone(&self.fire_sink);

        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(chrono::Utc).next() else {
                    return;
                };
                let wait = (next - chrono::Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);

                tokio::select! {
                    () = parent_cancel.cancelled() => return,
                    () = tokio::time::sleep(wait) => {
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
    fn invalid_expression_is_rejected_at_construction() {
        let sink = Arc::new(RecordingFireSink::default());
        let err = CronTrigger::new(TriggerId::new(), "not a cron expr", sink).unwrap_err();
        assert!(matches!(err, TriggerRunError::Validation(_)));
    }

    #[test]
    fn valid_five_field_expression_parses() {
        let sink = Arc::new(RecordingFireSink::default());
        assert!(CronTrigger::new(TriggerId::new(), "0 7 * * *", sink).is_ok());
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let sink = Arc::new(RecordingFireSink::default());
        let trigger = CronTrigger::new(TriggerId::new(), "0 7 * * *", sink).unwrap();
        assert!(trigger.stop().await.is_ok());
    }

    #[tokio::test]
    async fn start_then_stop_cancels_the_tick_loop() {
        let sink = Arc::new(RecordingFireSink::default());
        let trigger = CronTrigger::new(TriggerId::new(), "* * * * *", sink).unwrap();
        trigger.start(CancellationToken::new()).await.unwrap();
        assert!(trigger.stop().await.is_ok());
    }
}
