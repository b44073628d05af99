//! Trigger and trigger-fire data records (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use silver_telegram_core::{ExecutionId, TriggerFireId, TriggerId, WorkflowId};

/// The kind of trigger a config describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Standard 5-field cron schedule.
    Cron,
    /// Fixed-interval ticking.
    Interval,
    /// Passive: fired externally by the HTTP collaborator.
    Webhook,
    /// Spawns a child process speaking the line-delimited JSON protocol.
    External,
}

/// A trigger record (§3): identity, the workflow it fires, its kind, an
/// opaque JSON config bag, an enabled flag, and (for `external` triggers
/// only) the file path of the child program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Unique identifier.
    pub id: TriggerId,
    /// The workflow this trigger fires.
    pub workflow_id: WorkflowId,
    /// Trigger kind.
    pub kind: TriggerKind,
    /// Opaque, kind-specific configuration (cron expression, interval
    /// seconds, webhook path, external-process args, …).
    pub config: Value,
    /// Whether this trigger is currently enabled.
    pub enabled: bool,
    /// File path of the child program, required when `kind == External`.
    pub file_path: Option<String>,
}

impl Trigger {
    /// Creates a new, enabled trigger.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, kind: TriggerKind, config: Value) -> Self {
        Self {
            id: TriggerId::new(),
            workflow_id,
            kind,
            config,
            enabled: true,
            file_path: None,
        }
    }

    /// Sets the external-process file path.
    #[must_use]
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    /// Whether this trigger satisfies the invariant that `external`
    /// triggers carry a non-empty file path.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self.kind {
            TriggerKind::External => self
                .file_path
                .as_ref()
                .is_some_and(|path| !path.is_empty()),
            _ => true,
        }
    }
}

/// Outcome of one Fire invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerFireStatus {
    /// The run completed and a `TriggerFire` was recorded as a success.
    Success,
    /// Fire failed before or during the run.
    Failed,
    /// Fire was skipped (reserved for future missed-execution handling).
    Skipped,
}

/// An audit record of one firing (§3). Created exactly once per `Fire`
/// invocation, regardless of outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerFire {
    /// Unique identifier.
    pub id: TriggerFireId,
    /// The trigger that fired.
    pub trigger_id: TriggerId,
    /// The execution created, if one was (null iff the fire failed before
    /// an execution could be created).
    pub execution_id: Option<ExecutionId>,
    /// When this fire was recorded.
    pub fired_at: DateTime<Utc>,
    /// Outcome of this fire.
    pub status: TriggerFireStatus,
    /// The payload carried by this fire, if any.
    pub payload: Option<Value>,
    /// Error message, set when `status == Failed`.
    pub error: Option<String>,
}
