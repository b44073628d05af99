//! Node executor contract (§6): the opaque capability that actually
//! performs a node's side-effectful work.
//!
//! The core never interprets a node executor's internals — it is a
//! black-box program (HTTP call, SQL query, custom code, …) that takes a
//! node type and a resolved JSON payload and produces a JSON result. The
//! per-node timeout is enforced by the caller racing this future against a
//! timer, not by this trait.

use crate::node::NodeType;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// An error from the node executor itself (as opposed to a timeout or
/// cancellation, which the caller detects by racing the future).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeExecutorError(pub String);

impl fmt::Display for NodeExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NodeExecutorError {}

/// Invokes a node's work given its type and a resolved JSON payload
/// (`{config: <resolved>, input?: any}`), producing a JSON result whose
/// shape is interpreted by the port-parsing rules (§4.5 step 5).
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Runs one node to completion.
    async fn execute(&self, node_type: NodeType, payload: Value) -> Result<Value, NodeExecutorError>;
}

/// Reference executor that returns its payload's `config` unchanged.
///
/// Useful for tests that only care about graph traversal, not about any
/// particular node's behavior.
#[derive(Debug, Default)]
pub struct EchoExecutor;

#[async_trait]
impl NodeExecutor for EchoExecutor {
    async fn execute(&self, _node_type: NodeType, payload: Value) -> Result<Value, NodeExecutorError> {
        Ok(payload
            .get("config")
            .cloned()
            .unwrap_or(Value::Null))
    }
}

/// Test double that either always succeeds with a fixed output or always
/// fails with a fixed message.
#[derive(Debug, Clone)]
pub struct MockExecutor {
    output: Result<Value, String>,
}

impl MockExecutor {
    /// Builds an executor that always succeeds with `output`.
    #[must_use]
    pub fn succeeding(output: Value) -> Self {
        Self { output: Ok(output) }
    }

    /// Builds an executor that always fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            output: Err(message.into()),
        }
    }
}

#[async_trait]
impl NodeExecutor for MockExecutor {
    async fn execute(&self, _node_type: NodeType, _payload: Value) -> Result<Value, NodeExecutorError> {
        self.output
            .clone()
            .map_err(NodeExecutorError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn echo_executor_returns_its_config() {
        let executor = EchoExecutor;
        let payload = json!({"config": {"a": 1}});
        let result = executor.execute(NodeType::Transform, payload).await.unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[tokio::test]
    async fn mock_executor_succeeds_with_fixed_output() {
        let executor = MockExecutor::succeeding(json!({"ok": true}));
        let result = executor
            .execute(NodeType::CustomCode, Value::Null)
            .await
            .unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn mock_executor_fails_with_fixed_message() {
        let executor = MockExecutor::failing("boom");
        let err = executor
            .execute(NodeType::CustomCode, Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.0, "boom");
    }
}
