//! The workflow data model: identity, name, and a flat graph.
//!
//! Per the design notes on graph ownership, a workflow is a mapping from
//! node id to node plus a flat sequence of edges — not an object graph with
//! back-references. Adjacency queries iterate the edge sequence.

use crate::edge::Edge;
use crate::error::GraphError;
use crate::node::{Node, NodeId};
use serde::{Deserialize, Serialize};
use silver_telegram_core::WorkflowId;
use std::collections::HashMap;

/// A user-defined directed graph of nodes, identified and named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Identity of this workflow.
    pub id: WorkflowId,
    /// Human-readable name.
    pub name: String,
    /// Nodes keyed by id.
    pub nodes: HashMap<NodeId, Node>,
    /// Edges, in declaration order (routing picks the first matching edge).
    pub edges: Vec<Edge>,
}

impl Workflow {
    /// Creates an empty workflow with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            nodes: HashMap::new(),
            edges: Vec::new(),
        }
    }

    /// Inserts or replaces a node.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Appends an edge.
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns the ids of nodes with no inbound edge.
    ///
    /// A workflow needs at least one of these to be runnable.
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<&NodeId> {
        let has_inbound: std::collections::HashSet<&NodeId> =
            self.edges.iter().map(|edge| &edge.target).collect();
        self.nodes
            .keys()
            .filter(|id| !has_inbound.contains(id))
            .collect()
    }

    /// Picks the start node for a fresh `Run`: the first entry node in a
    /// stable order (node ids are sorted so the choice is deterministic).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NoStartNode`] if the workflow has no entry
    /// node.
    pub fn start_node(&self) -> Result<&NodeId, GraphError> {
        let mut entries = self.entry_nodes();
        entries.sort();
        entries.into_iter().next().ok_or(GraphError::NoStartNode)
    }

    /// Validates structural invariants: every edge endpoint exists in the
    /// node map.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] naming the first missing node
    /// id encountered.
    pub fn validate(&self) -> Result<(), GraphError> {
        for edge in &self.edges {
            if !self.nodes.contains_key(&edge.source) {
                return Err(GraphError::NodeNotFound(edge.source.clone()));
            }
            if !self.nodes.contains_key(&edge.target) {
                return Err(GraphError::NodeNotFound(edge.target.clone()));
            }
        }
        Ok(())
    }

    /// Finds the next node reachable from `from` given the port it
    /// produced: the first edge in declaration order whose source matches
    /// `from` and whose source-port is empty or equal to `produced_port`.
    #[must_use]
    pub fn route(&self, from: &NodeId, produced_port: &str) -> Option<&NodeId> {
        self.edges
            .iter()
            .find(|edge| edge.matches(from, produced_port))
            .map(|edge| &edge.target)
    }
}
