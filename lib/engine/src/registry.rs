//! Execution registry: process-wide map from execution id to cancel
//! handle (§4.3).
//!
//! Does not own execution identity — storage does; it indexes only the
//! in-flight runs.

use crate::error::EngineError;
use silver_telegram_core::ExecutionId;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Process-wide registry of cancellation handles for active executions.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    handles: RwLock<HashMap<ExecutionId, CancellationToken>>,
}

impl ExecutionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cancellation handle for `execution_id`, replacing any
    /// existing entry.
    pub fn register(&self, execution_id: ExecutionId, token: CancellationToken) {
        self.handles
            .write()
            .expect("registry lock poisoned")
            .insert(execution_id, token);
    }

    /// Removes the entry for `execution_id`, if any.
    pub fn unregister(&self, execution_id: ExecutionId) {
        self.handles
            .write()
            .expect("registry lock poisoned")
            .remove(&execution_id);
    }

    /// Invokes the cancel handle for `execution_id` and removes it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if no handle is registered for
    /// this id.
    pub fn cancel(&self, execution_id: ExecutionId) -> Result<(), EngineError> {
        let token = self
            .handles
            .write()
            .expect("registry lock poisoned")
            .remove(&execution_id)
            .ok_or(EngineError::NotFound)?;
        token.cancel();
        Ok(())
    }

    /// Whether an execution is currently registered.
    #[must_use]
    pub fn is_active(&self, execution_id: ExecutionId) -> bool {
        self.handles
            .read()
            .expect("registry lock poisoned")
            .contains_key(&execution_id)
    }

    /// Number of currently registered executions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.handles.read().expect("registry lock poisoned").len()
    }

    /// Invokes every registered cancel handle and clears the registry.
    ///
    /// Tolerates an empty registry; never fails.
    pub fn cancel_all(&self) {
        let mut handles = self.handles.write().expect("registry lock poisoned");
        for (_, token) in handles.drain() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_all_invokes_every_handle_and_empties_registry() {
        let registry = ExecutionRegistry::new();
        let id1 = ExecutionId::new();
        let id2 = ExecutionId::new();
        let token1 = CancellationToken::new();
        let token2 = CancellationToken::new();
        registry.register(id1, token1.clone());
        registry.register(id2, token2.clone());

        registry.cancel_all();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn cancel_missing_id_returns_not_found() {
        let registry = ExecutionRegistry::new();
        let err = registry.cancel(ExecutionId::new()).unwrap_err();
        assert_eq!(err, EngineError::NotFound);
    }

    #[test]
    fn cancel_removes_entry_after_invoking() {
        let registry = ExecutionRegistry::new();
        let id = ExecutionId::new();
        let token = CancellationToken::new();
        registry.register(id, token.clone());

        registry.cancel(id).unwrap();

        assert!(token.is_cancelled());
        assert!(!registry.is_active(id));
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ExecutionRegistry::new();
        let id = ExecutionId::new();
        registry.unregister(id);
        registry.register(id, CancellationToken::new());
        registry.unregister(id);
        registry.unregister(id);
        assert!(!registry.is_active(id));
    }
}
