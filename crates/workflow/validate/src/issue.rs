//! Validation issue reporting

use limsflow_types::NodeId;
use serde::{Deserialize, Serialize};

/// The category of a structural problem found in a definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// No Start node exists
    NoStartNode,
    /// More than one Start node exists
    MultipleStartNodes,
    /// No End node exists
    NoEndNode,
    /// Two nodes share an id
    DuplicateNodeId,
    /// An edge names a node that does not exist
    UnknownEdgeEndpoint,
    /// A node cannot be reached from Start
    UnreachableNode,
    /// A non-End node cannot reach any End node
    DeadEndNode,
    /// A cycle contains no Decision node that can exit it
    UnguardedLoop,
    /// A non-End node has no outgoing edges
    MissingOutgoingEdge,
    /// A non-Start node has no incoming edges
    MissingIncomingEdge,
    /// Two outgoing edges of one node carry the same label
    DuplicateBranchLabel,
    /// A Decision node has an unlabeled outgoing edge
    UnlabeledDecisionEdge,
    /// A condition's target label matches no outgoing edge
    DanglingConditionLabel,
    /// A Decision node has fewer than two outgoing edges
    InsufficientDecisionBranches,
    /// A Process, Approval or Review node has no assignees
    EmptyAssignees,
    /// A Wait node has a zero duration
    NonPositiveDuration,
    /// An Escalation node names no escalation target
    MissingEscalationTarget,
}

/// One finding from validating a definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// The node the finding is about, when it concerns a single node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Human-readable detail
    pub detail: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, node_id: Option<NodeId>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            node_id,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(id) => write!(f, "[{:?}] {}: {}", self.kind, id, self.detail),
            None => write!(f, "[{:?}] {}", self.kind, self.detail),
        }
    }
}

/// The full result of validating a definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True only when no issue at all was found. Any finding blocks
    /// activation.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// One-line summary for error messages and logs.
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_validity() {
        let report = ValidationReport { issues: vec![] };
        assert!(report.is_valid());

        // Any issue at all makes the report invalid, including the
        // ones that merely look suspicious.
        let report = ValidationReport {
            issues: vec![ValidationIssue::new(
                IssueKind::UnreachableNode,
                Some(NodeId::new("orphan")),
                "not reachable from start",
            )],
        };
        assert!(!report.is_valid());
        assert_eq!(report.summary(), "[UnreachableNode] orphan: not reachable from start");
    }
}
