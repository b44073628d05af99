//! Error types for the triggers crate.
//!
//! `TriggerRunError` covers failures inside one trigger runner (IPC
//! violations, capability misuse); `TriggerManagerError` covers the
//! manager's own operations (lookup, registration, and wrapping a Fire's
//! lower-layer failures).

use silver_telegram_engine::{EngineError, StorageError};
use std::fmt;

/// Errors from an individual trigger runner (§4.7, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerRunError {
    /// The external-process trigger's wire protocol was violated, or the
    /// child died unexpectedly.
    Ipc(String),
    /// `invoke` was called before the trigger signalled readiness.
    NotReady,
    /// `invoke` was called on a trigger variant that does not support it.
    NotSupported,
    /// Trigger configuration failed validation (e.g. a missing/invalid
    /// cron expression, an `external` trigger with no file path).
    Validation(String),
    /// Starting the trigger's underlying resource (file, child process)
    /// failed.
    Io(String),
}

impl fmt::Display for TriggerRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipc(msg) => write!(f, "ipc error: {msg}"),
            Self::NotReady => write!(f, "trigger is not ready"),
            Self::NotSupported => write!(f, "operation not supported by this trigger"),
            Self::Validation(msg) => write!(f, "invalid trigger configuration: {msg}"),
            Self::Io(msg) => write!(f, "trigger io error: {msg}"),
        }
    }
}

impl std::error::Error for TriggerRunError {}

/// Errors from the trigger manager's own operations (§4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerManagerError {
    /// No trigger (or trigger fire) with that id.
    NotFound,
    /// A trigger with that id is already registered.
    Conflict,
    /// Wraps a lower-layer storage failure.
    Storage(StorageError),
    /// Wraps a lower-layer graph-runner failure surfaced during Fire.
    Engine(EngineError),
    /// Wraps a failure from the trigger runner itself.
    Runner(TriggerRunError),
}

impl fmt::Display for TriggerManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "trigger not found"),
            Self::Conflict => write!(f, "trigger already registered"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Engine(err) => write!(f, "engine error: {err}"),
            Self::Runner(err) => write!(f, "trigger runner error: {err}"),
        }
    }
}

impl std::error::Error for TriggerManagerError {}

impl From<StorageError> for TriggerManagerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<EngineError> for TriggerManagerError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<TriggerRunError> for TriggerManagerError {
    fn from(err: TriggerRunError) -> Self {
        Self::Runner(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_run_error_display() {
        assert_eq!(TriggerRunError::NotReady.to_string(), "trigger is not ready");
        assert!(TriggerRunError::Ipc("boom".into()).to_string().contains("boom"));
    }

    #[test]
    fn trigger_manager_error_wraps_lower_layers() {
        let err: TriggerManagerError = TriggerRunError::NotSupported.into();
        assert!(matches!(err, TriggerManagerError::Runner(TriggerRunError::NotSupported)));
    }
}
