//! Edges between nodes.
//!
//! Edges are data, not object-graph back-references (per the design notes
//! on graph ownership): a workflow is a node map plus a flat sequence of
//! edges, and adjacency is answered by scanning that sequence.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// A directed connection between two nodes, optionally labelled on the
/// source side.
///
/// An empty/`None` `source_port` matches any produced port; a `Some` port
/// must equal the produced port exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// The node this edge originates from.
    pub source: NodeId,
    /// The node this edge terminates at.
    pub target: NodeId,
    /// Port label required on the source side, or `None` to match any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    /// Port label on the target side; informational only — the graph
    /// runner does not currently branch on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<String>,
}

impl Edge {
    /// Creates an edge with no port labels (matches any produced port).
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_port: None,
            target_port: None,
        }
    }

    /// Creates an edge that only matches when the produced port equals
    /// `source_port`.
    #[must_use]
    pub fn with_port(
        source: impl Into<NodeId>,
        source_port: impl Into<String>,
        target: impl Into<NodeId>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_port: Some(source_port.into()),
            target_port: None,
        }
    }

    /// Returns whether this edge routes a produced port originating at
    /// `from`.
    #[must_use]
    pub fn matches(&self, from: &NodeId, produced_port: &str) -> bool {
        &self.source == from
            && self
                .source_port
                .as_deref()
                .is_none_or(|port| port == produced_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlabeled_edge_matches_any_port() {
        let edge = Edge::new("a", "b");
        assert!(edge.matches(&NodeId::new("a"), "default"));
        assert!(edge.matches(&NodeId::new("a"), "true"));
    }

    #[test]
    fn labeled_edge_matches_only_its_port() {
        let edge = Edge::with_port("a", "true", "b");
        assert!(edge.matches(&NodeId::new("a"), "true"));
        assert!(!edge.matches(&NodeId::new("a"), "false"));
    }

    #[test]
    fn edge_never_matches_wrong_source() {
        let edge = Edge::new("a", "b");
        assert!(!edge.matches(&NodeId::new("c"), "default"));
    }

    #[test]
    fn edge_serde_roundtrip() {
        let edge = Edge::with_port("n", "true", "m");
        let json = serde_json::to_string(&edge).expect("serialize");
        let parsed: Edge = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(edge, parsed);
    }
}
