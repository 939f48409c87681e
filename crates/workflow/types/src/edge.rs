//! Workflow edges: directed transitions between nodes
//!
//! Edges carry an optional label. Labels are significant on Decision
//! sources, where they must match a configured branch label, and for the
//! two distinguished labels the engine gives meaning to: `rejected`
//! (taken when an approval is rejected) and `escalate` (taken when a
//! timed node expires instead of failing the instance).

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Distinguished edge labels understood by the engine.
pub mod labels {
    /// Outgoing edge of an Approval/Review taken on approval.
    pub const APPROVED: &str = "approved";
    /// Outgoing edge of an Approval/Review taken on rejection.
    pub const REJECTED: &str = "rejected";
    /// Outgoing edge taken when a timed node expires.
    pub const ESCALATE: &str = "escalate";
}

/// An edge in the workflow graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    /// Source node
    pub source: NodeId,
    /// Target node
    pub target: NodeId,
    /// Optional label (branch name or distinguished label)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl WorkflowEdge {
    /// Create an unlabeled edge.
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            source,
            target,
            label: None,
        }
    }

    /// Create a labeled edge.
    pub fn labeled(source: NodeId, target: NodeId, label: impl Into<String>) -> Self {
        Self {
            source,
            target,
            label: Some(label.into()),
        }
    }

    /// Check whether this edge carries the given label.
    pub fn has_label(&self, label: &str) -> bool {
        self.label.as_deref() == Some(label)
    }

    /// True if the label is one of the engine's distinguished labels.
    pub fn is_distinguished(&self) -> bool {
        matches!(
            self.label.as_deref(),
            Some(labels::REJECTED) | Some(labels::ESCALATE)
        )
    }
}

impl std::fmt::Display for WorkflowEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(l) => write!(f, "{} -[{}]-> {}", self.source, l, self.target),
            None => write!(f, "{} -> {}", self.source, self.target),
        }
    }
}
