//! Error kinds surfaced by the engine.
//!
//! Three small plain enums, layered the way the rest of the workspace
//! layers errors: a narrow [`GraphError`] for structural graph problems, a
//! narrow [`StorageError`] for the storage contract (§4.1), and the
//! umbrella [`EngineError`] the graph runner and workflow runner actually
//! return, which every other kind converts into.

use crate::node::NodeId;
use std::fmt;

/// Structural problems with a workflow's graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The workflow has no node without an inbound edge.
    NoStartNode,
    /// An edge (or a saved `current_node_id`) names a node absent from the
    /// workflow.
    NodeNotFound(NodeId),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStartNode => write!(f, "workflow has no start node"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Failures from the storage contract (§4.1): every operation fails with
/// one of these three kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The requested entity does not exist.
    NotFound,
    /// A create conflicted with an existing id.
    Conflict,
    /// Underlying I/O failure.
    Io(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Conflict => write!(f, "conflict: duplicate id"),
            Self::Io(message) => write!(f, "storage I/O error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// The error vocabulary surfaced by the engine's public operations.
///
/// Variant names match the kinds enumerated in §7 of the specification
/// this engine implements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Storage lookup missed.
    NotFound,
    /// Duplicate id on create.
    Conflict,
    /// Malformed input.
    Validation(String),
    /// A template referenced a missing path or a non-mapping intermediate.
    UnresolvedVariable(String),
    /// The workflow has no start node.
    NoStartNode,
    /// An edge or saved state names a node absent from the workflow.
    NodeNotFound(NodeId),
    /// No persisted state exists for a `Resume`.
    NoSavedState,
    /// Persisted state exists but failed to parse.
    StateParseError(String),
    /// A node exceeded its per-node budget, or a fire exceeded the
    /// 5-minute cap.
    Timeout,
    /// Cooperative cancellation fired.
    Cancelled,
    /// The external node executor returned an error.
    ExecutorError(String),
    /// Underlying storage failure.
    Storage(StorageError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Conflict => write!(f, "conflict: duplicate id"),
            Self::Validation(message) => write!(f, "validation error: {message}"),
            Self::UnresolvedVariable(path) => write!(f, "unresolved variable: {path}"),
            Self::NoStartNode => write!(f, "workflow has no start node"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::NoSavedState => write!(f, "no saved state for execution"),
            Self::StateParseError(message) => write!(f, "state parse error: {message}"),
            Self::Timeout => write!(f, "timed out"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ExecutorError(message) => write!(f, "executor error: {message}"),
            Self::Storage(inner) => write!(f, "storage error: {inner}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<GraphError> for EngineError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NoStartNode => Self::NoStartNode,
            GraphError::NodeNotFound(id) => Self::NodeNotFound(id),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            StorageError::Conflict => Self::Conflict,
            other => Self::Storage(other),
        }
    }
}
